use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Deserialize;

use super::{
    AttendanceError, MeetingCount, RecordKey, SaveMode, StudentAttendanceRecord,
    StudentAttendanceRow, TeacherAttendanceEntry, TeacherAttendanceRecord,
};
use crate::store::{KeyValueStore, Write, STUDENT_ATTENDANCE, TEACHER_ATTENDANCE};

/// A teacher line as typed into the form; incomplete lines are dropped on save.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherEntryDraft {
    #[serde(default)]
    pub teacher_id: Option<String>,
    #[serde(default)]
    pub subject_id: Option<String>,
    #[serde(default)]
    pub meetings_taught: Option<u32>,
}

fn non_blank(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub fn complete_entries(
    drafts: &[TeacherEntryDraft],
) -> Result<Vec<TeacherAttendanceEntry>, AttendanceError> {
    let mut entries = Vec::new();
    for d in drafts {
        let (Some(teacher_id), Some(subject_id)) = (non_blank(&d.teacher_id), non_blank(&d.subject_id))
        else {
            continue;
        };
        let meetings_taught = d.meetings_taught.unwrap_or(1);
        if meetings_taught == 0 {
            return Err(AttendanceError::Validation(format!(
                "meetingsTaught must be at least 1 (teacher {teacher_id})"
            )));
        }
        entries.push(TeacherAttendanceEntry {
            teacher_id: teacher_id.to_string(),
            subject_id: subject_id.to_string(),
            meetings_taught,
        });
    }
    if entries.is_empty() {
        return Err(AttendanceError::Validation(
            "no teacher attendance supplied".to_string(),
        ));
    }
    Ok(entries)
}

fn validate_rows(
    rows: &[StudentAttendanceRow],
    meeting_count: MeetingCount,
) -> Result<(), AttendanceError> {
    let mut seen = HashSet::new();
    for row in rows {
        if !seen.insert(row.student_id.as_str()) {
            return Err(AttendanceError::Validation(format!(
                "student {} appears more than once",
                row.student_id
            )));
        }
        if row.status.len() != meeting_count.slots() {
            return Err(AttendanceError::Validation(format!(
                "student {} has {} status slots, expected {}",
                row.student_id,
                row.status.len(),
                meeting_count.slots()
            )));
        }
    }
    Ok(())
}

/// Commit surface for attendance record pairs.
pub struct AttendanceBook<'a, S: KeyValueStore> {
    store: &'a S,
}

impl<'a, S: KeyValueStore> AttendanceBook<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn exists(&self, key: &RecordKey) -> Result<bool, AttendanceError> {
        Ok(self.store.contains(STUDENT_ATTENDANCE, key.as_str())?
            || self.store.contains(TEACHER_ATTENDANCE, key.as_str())?)
    }

    pub fn load(
        &self,
        key: &RecordKey,
    ) -> Result<(Option<StudentAttendanceRecord>, Option<TeacherAttendanceRecord>), AttendanceError>
    {
        let students = self.store.get_as(STUDENT_ATTENDANCE, key.as_str())?;
        let teachers = self.store.get_as(TEACHER_ATTENDANCE, key.as_str())?;
        Ok((students, teachers))
    }

    /// Writes both sides of the session in one store transaction.
    ///
    /// In [`SaveMode::Create`] an existing record under `key` is never
    /// overwritten; the caller has to reopen it in edit mode.
    pub fn save(
        &self,
        key: &RecordKey,
        rows: Vec<StudentAttendanceRow>,
        teachers: &[TeacherEntryDraft],
        mode: SaveMode,
        meeting_count: MeetingCount,
    ) -> Result<(), AttendanceError> {
        let entries = complete_entries(teachers)?;
        if NaiveDate::parse_from_str(key.date(), "%Y-%m-%d").is_err() {
            return Err(AttendanceError::Validation(format!(
                "date must be YYYY-MM-DD, got {}",
                key.date()
            )));
        }
        validate_rows(&rows, meeting_count)?;

        if !mode.is_edit() && self.exists(key)? {
            tracing::warn!(key = %key, "refusing to create over an existing record");
            return Err(AttendanceError::DuplicateRecord {
                key: key.to_string(),
            });
        }

        let student_record = StudentAttendanceRecord {
            id: key.as_str().to_string(),
            class_id: key.class_id().to_string(),
            date: key.date().to_string(),
            rows,
        };
        let teacher_record = TeacherAttendanceRecord {
            id: key.as_str().to_string(),
            class_id: key.class_id().to_string(),
            date: key.date().to_string(),
            entries,
        };
        self.store.apply(&[
            Write::put(STUDENT_ATTENDANCE, key.as_str(), &student_record)?,
            Write::put(TEACHER_ATTENDANCE, key.as_str(), &teacher_record)?,
        ])?;
        tracing::info!(
            key = %key,
            students = student_record.rows.len(),
            teachers = teacher_record.entries.len(),
            edit = mode.is_edit(),
            "attendance committed"
        );
        Ok(())
    }

    /// Removes both sides of the session. Returns whether anything existed.
    pub fn delete(&self, key: &RecordKey) -> Result<bool, AttendanceError> {
        if !self.exists(key)? {
            return Ok(false);
        }
        self.store.apply(&[
            Write::delete(STUDENT_ATTENDANCE, key.as_str()),
            Write::delete(TEACHER_ATTENDANCE, key.as_str()),
        ])?;
        tracing::info!(key = %key, "attendance deleted");
        Ok(true)
    }

    pub fn student_records(&self) -> Result<Vec<StudentAttendanceRecord>, AttendanceError> {
        Ok(self.store.list_as(STUDENT_ATTENDANCE)?)
    }

    pub fn teacher_records(&self) -> Result<Vec<TeacherAttendanceRecord>, AttendanceError> {
        Ok(self.store.list_as(TEACHER_ATTENDANCE)?)
    }
}
