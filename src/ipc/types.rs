use std::collections::HashMap;
use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::attendance::{MeetingCount, RecordKey, SaveMode, StudentAttendanceRow};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// An attendance form being edited. Lives only in memory until saved.
#[derive(Debug, Clone)]
pub struct EditSession {
    pub key: RecordKey,
    pub mode: SaveMode,
    pub meeting_count: MeetingCount,
    pub rows: Vec<StudentAttendanceRow>,
}

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub sessions: HashMap<String, EditSession>,
}
