//! Reduces dated attendance records into per-student and per-teacher totals.

use std::collections::BTreeMap;
use std::ops::{Add, AddAssign};

use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;

use super::{StatusCode, StudentAttendanceRecord, StudentAttendanceRow, TeacherAttendanceRecord};
use crate::directory::ReferenceIndex;

/// Which record dates take part in a report. Dates compare as ISO text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatePredicate {
    All,
    /// Inclusive. With either bound missing no date filtering happens.
    Range {
        start: Option<String>,
        end: Option<String>,
    },
    /// `"YYYY-MM"` prefix.
    Month(String),
    /// Sunday through Saturday of the week containing `today`.
    Week { today: NaiveDate },
}

impl DatePredicate {
    #[cfg(test)]
    pub fn range(start: &str, end: &str) -> Self {
        DatePredicate::Range {
            start: Some(start.to_string()),
            end: Some(end.to_string()),
        }
    }

    pub fn month_of(today: NaiveDate) -> Self {
        DatePredicate::Month(today.format("%Y-%m").to_string())
    }

    pub fn matches(&self, date: &str) -> bool {
        match self {
            DatePredicate::All => true,
            DatePredicate::Range {
                start: Some(start),
                end: Some(end),
            } => date >= start.as_str() && date <= end.as_str(),
            DatePredicate::Range { .. } => true,
            DatePredicate::Month(prefix) => date.starts_with(prefix.as_str()),
            DatePredicate::Week { today } => {
                let (first, last) = week_bounds(*today);
                let first = first.format("%Y-%m-%d").to_string();
                let last = last.format("%Y-%m-%d").to_string();
                date >= first.as_str() && date <= last.as_str()
            }
        }
    }
}

/// Sunday-start week containing `today`.
pub fn week_bounds(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let back = u64::from(today.weekday().num_days_from_sunday());
    let first = today.checked_sub_days(Days::new(back)).unwrap_or(today);
    let last = first.checked_add_days(Days::new(6)).unwrap_or(first);
    (first, last)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    #[serde(rename = "H")]
    pub hadir: u64,
    #[serde(rename = "S")]
    pub sakit: u64,
    #[serde(rename = "I")]
    pub ijin: u64,
    #[serde(rename = "A")]
    pub alpa: u64,
}

impl StatusCounts {
    pub fn record(&mut self, status: StatusCode) {
        match status {
            StatusCode::Hadir => self.hadir += 1,
            StatusCode::Sakit => self.sakit += 1,
            StatusCode::Ijin => self.ijin += 1,
            StatusCode::Alpa => self.alpa += 1,
        }
    }

    /// Counts the defined slots of one row.
    pub fn record_row(&mut self, row: &StudentAttendanceRow) {
        row.status.iter().flatten().for_each(|s| self.record(*s));
    }

    pub fn total(&self) -> u64 {
        self.hadir + self.sakit + self.ijin + self.alpa
    }
}

impl AddAssign for StatusCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.hadir += rhs.hadir;
        self.sakit += rhs.sakit;
        self.ijin += rhs.ijin;
        self.alpa += rhs.alpa;
    }
}

impl Add for StatusCounts {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentTally {
    pub student_id: String,
    pub class_id: String,
    pub counts: StatusCounts,
}

/// Per `(class, student)` totals over the filtered records, in class/student id order.
pub fn tally_students(
    records: &[StudentAttendanceRecord],
    class_filter: Option<&str>,
    predicate: &DatePredicate,
) -> Vec<StudentTally> {
    let mut totals: BTreeMap<(&str, &str), StatusCounts> = BTreeMap::new();
    for record in records
        .iter()
        .filter(|r| class_filter.map_or(true, |c| r.class_id == c))
        .filter(|r| predicate.matches(&r.date))
    {
        for row in &record.rows {
            totals
                .entry((record.class_id.as_str(), row.student_id.as_str()))
                .or_default()
                .record_row(row);
        }
    }
    totals
        .into_iter()
        .map(|((class_id, student_id), counts)| StudentTally {
            student_id: student_id.to_string(),
            class_id: class_id.to_string(),
            counts,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentReportRow {
    pub student_id: String,
    pub student_name: String,
    pub class_id: String,
    pub class_name: String,
    #[serde(flatten)]
    pub counts: StatusCounts,
    pub total: u64,
}

/// Student recap rows. Students or classes that no longer resolve, and
/// students transferred out, are omitted.
pub fn aggregate_students(
    records: &[StudentAttendanceRecord],
    class_filter: Option<&str>,
    predicate: &DatePredicate,
    refs: &ReferenceIndex,
) -> Vec<StudentReportRow> {
    let mut rows: Vec<StudentReportRow> = tally_students(records, class_filter, predicate)
        .into_iter()
        .filter_map(|t| {
            let (Some(student), Some(class)) = (refs.student(&t.student_id), refs.classroom(&t.class_id))
            else {
                tracing::debug!(student_id = %t.student_id, class_id = %t.class_id, "dropping unresolved recap row");
                return None;
            };
            if student.transferred {
                return None;
            }
            Some(StudentReportRow {
                student_name: student.name.clone(),
                class_name: class.name.clone(),
                student_id: t.student_id,
                class_id: t.class_id,
                total: t.counts.total(),
                counts: t.counts,
            })
        })
        .collect();
    rows.sort_by(|a, b| {
        a.class_name
            .cmp(&b.class_name)
            .then_with(|| a.student_name.cmp(&b.student_name))
            .then_with(|| a.student_id.cmp(&b.student_id))
    });
    rows
}

/// Total meetings taught per teacher id, in id order.
pub fn tally_teachers(
    records: &[TeacherAttendanceRecord],
    predicate: &DatePredicate,
) -> Vec<(String, u64)> {
    let mut totals: BTreeMap<&str, u64> = BTreeMap::new();
    for record in records.iter().filter(|r| predicate.matches(&r.date)) {
        for entry in &record.entries {
            *totals.entry(entry.teacher_id.as_str()).or_default() += u64::from(entry.meetings_taught);
        }
    }
    totals
        .into_iter()
        .map(|(id, total)| (id.to_string(), total))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherReportRow {
    pub teacher_id: String,
    pub teacher_name: String,
    pub status: Option<String>,
    pub nip: Option<String>,
    pub total_meetings: u64,
}

pub fn aggregate_teachers(
    records: &[TeacherAttendanceRecord],
    predicate: &DatePredicate,
    refs: &ReferenceIndex,
) -> Vec<TeacherReportRow> {
    let mut rows: Vec<TeacherReportRow> = tally_teachers(records, predicate)
        .into_iter()
        .filter_map(|(teacher_id, total_meetings)| {
            let Some(teacher) = refs.teacher(&teacher_id) else {
                tracing::debug!(teacher_id = %teacher_id, "dropping unresolved teacher row");
                return None;
            };
            Some(TeacherReportRow {
                teacher_name: teacher.name.clone(),
                status: teacher.status.clone(),
                nip: teacher.nip.clone(),
                teacher_id,
                total_meetings,
            })
        })
        .collect();
    rows.sort_by(|a, b| {
        a.teacher_name
            .cmp(&b.teacher_name)
            .then_with(|| a.teacher_id.cmp(&b.teacher_id))
    });
    rows
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSummary {
    pub key: String,
    pub class_id: String,
    /// `None` once the class has been deleted.
    pub class_name: Option<String>,
    pub date: String,
    #[serde(flatten)]
    pub counts: StatusCounts,
}

/// One line per stored session, newest first.
pub fn summarize_records(
    records: &[StudentAttendanceRecord],
    class_filter: Option<&str>,
    refs: &ReferenceIndex,
) -> Vec<RecordSummary> {
    let mut out: Vec<RecordSummary> = records
        .iter()
        .filter(|r| class_filter.map_or(true, |c| r.class_id == c))
        .map(|r| {
            let mut counts = StatusCounts::default();
            r.rows.iter().for_each(|row| counts.record_row(row));
            RecordSummary {
                key: r.id.clone(),
                class_id: r.class_id.clone(),
                class_name: refs.classroom(&r.class_id).map(|c| c.name.clone()),
                date: r.date.clone(),
                counts,
            }
        })
        .collect();
    out.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.key.cmp(&b.key)));
    out
}
