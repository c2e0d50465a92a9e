use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AttendanceError {
    #[error("an attendance record already exists for {key}")]
    DuplicateRecord { key: String },
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AttendanceError {
    /// Wire code used in IPC error objects.
    pub fn code(&self) -> &'static str {
        match self {
            AttendanceError::DuplicateRecord { .. } => "duplicate_record",
            AttendanceError::Validation(_) => "validation_failed",
            AttendanceError::Store(StoreError::Db(_)) => "db_query_failed",
            AttendanceError::Store(StoreError::Json(_)) => "db_corrupt_document",
        }
    }
}
