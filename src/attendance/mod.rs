//! Per-class, per-date attendance records for students and teachers.
//!
//! A record pair (student side and teacher side) is bound to one class and one
//! calendar date through a [`RecordKey`]. Editing goes through
//! [`reconcile::build_editable_matrix`] and the [`editor`] functions, commits
//! through [`upsert::AttendanceBook`], and reporting through [`aggregate`].

use serde::{Deserialize, Serialize};

pub mod aggregate;
pub mod editor;
pub mod error;
pub mod key;
pub mod reconcile;
pub mod upsert;

pub use error::AttendanceError;
pub use key::RecordKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    #[serde(rename = "H")]
    Hadir,
    #[serde(rename = "S")]
    Sakit,
    #[serde(rename = "I")]
    Ijin,
    #[serde(rename = "A")]
    Alpa,
}

impl StatusCode {
    pub fn code(self) -> &'static str {
        match self {
            StatusCode::Hadir => "H",
            StatusCode::Sakit => "S",
            StatusCode::Ijin => "I",
            StatusCode::Alpa => "A",
        }
    }

    /// Accepts the one-letter code or the full name, case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "H" | "HADIR" => Some(StatusCode::Hadir),
            "S" | "SAKIT" => Some(StatusCode::Sakit),
            "I" | "IJIN" | "IZIN" => Some(StatusCode::Ijin),
            "A" | "ALPA" => Some(StatusCode::Alpa),
            _ => None,
        }
    }
}

/// Number of meeting slots per day, fixed by the school's week format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeetingCount {
    Five,
    Six,
}

impl MeetingCount {
    pub fn slots(self) -> usize {
        match self {
            MeetingCount::Five => 5,
            MeetingCount::Six => 6,
        }
    }
}

/// One roster student's statuses for the day. A `None` slot is one that an
/// older writer left undefined; it is carried as-is and never counted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAttendanceRow {
    pub student_id: String,
    pub status: Vec<Option<StatusCode>>,
}

impl StudentAttendanceRow {
    pub fn present(student_id: impl Into<String>, meeting_count: MeetingCount) -> Self {
        Self {
            student_id: student_id.into(),
            status: vec![Some(StatusCode::Hadir); meeting_count.slots()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAttendanceRecord {
    pub id: String,
    pub class_id: String,
    pub date: String,
    pub rows: Vec<StudentAttendanceRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherAttendanceEntry {
    pub teacher_id: String,
    pub subject_id: String,
    pub meetings_taught: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherAttendanceRecord {
    pub id: String,
    pub class_id: String,
    pub date: String,
    pub entries: Vec<TeacherAttendanceEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    Create,
    Edit,
}

impl SaveMode {
    pub fn is_edit(self) -> bool {
        self == SaveMode::Edit
    }
}
