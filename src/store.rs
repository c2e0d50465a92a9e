//! Flat keyed persistence over the workspace database.
//!
//! Every entity lives under a `(collection, key)` pair as a JSON document.
//! Reference data (students, classes, teachers, subjects, school profile) is
//! owned by whoever writes it; the attendance core only owns the two
//! `attendance.*` collections.

use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

pub const STUDENTS: &str = "students";
pub const CLASSES: &str = "classes";
pub const TEACHERS: &str = "teachers";
pub const SUBJECTS: &str = "subjects";
pub const SCHOOL: &str = "school";
pub const STUDENT_ATTENDANCE: &str = "attendance.students";
pub const TEACHER_ATTENDANCE: &str = "attendance.teachers";

pub const REFERENCE_COLLECTIONS: [&str; 5] = [STUDENTS, CLASSES, TEACHERS, SUBJECTS, SCHOOL];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("malformed stored document: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    Put {
        collection: &'static str,
        key: String,
        value: serde_json::Value,
    },
    Delete {
        collection: &'static str,
        key: String,
    },
}

impl Write {
    pub fn put<T: Serialize>(
        collection: &'static str,
        key: impl Into<String>,
        value: &T,
    ) -> Result<Self, StoreError> {
        Ok(Write::Put {
            collection,
            key: key.into(),
            value: serde_json::to_value(value)?,
        })
    }

    pub fn delete(collection: &'static str, key: impl Into<String>) -> Self {
        Write::Delete {
            collection,
            key: key.into(),
        }
    }
}

pub trait KeyValueStore {
    fn get(&self, collection: &str, key: &str) -> Result<Option<serde_json::Value>, StoreError>;

    /// All documents of a collection, ordered by key.
    fn list(&self, collection: &str) -> Result<Vec<(String, serde_json::Value)>, StoreError>;

    /// Applies every write or none of them.
    fn apply(&self, writes: &[Write]) -> Result<(), StoreError>;

    fn contains(&self, collection: &str, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(collection, key)?.is_some())
    }

    fn get_as<T: DeserializeOwned>(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        match self.get(collection, key)? {
            Some(v) => Ok(Some(serde_json::from_value(v)?)),
            None => Ok(None),
        }
    }

    /// Decodes a whole collection, skipping documents that do not fit `T`.
    fn list_as<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>, StoreError> {
        let mut out = Vec::new();
        for (key, value) in self.list(collection)? {
            match serde_json::from_value::<T>(value) {
                Ok(v) => out.push(v),
                Err(e) => {
                    tracing::warn!(collection, key = %key, error = %e, "skipping undecodable document");
                }
            }
        }
        Ok(out)
    }
}

pub struct SqliteStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl KeyValueStore for SqliteStore<'_> {
    fn get(&self, collection: &str, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM kv WHERE collection = ? AND key = ?",
                (collection, key),
                |r| r.get(0),
            )
            .optional()?;
        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    fn list(&self, collection: &str) -> Result<Vec<(String, serde_json::Value)>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM kv WHERE collection = ? ORDER BY key")?;
        let rows = stmt
            .query_map([collection], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(k, v)| Ok((k, serde_json::from_str(&v)?)))
            .collect()
    }

    fn apply(&self, writes: &[Write]) -> Result<(), StoreError> {
        let now = chrono::Utc::now().to_rfc3339();
        let tx = self.conn.unchecked_transaction()?;
        for w in writes {
            match w {
                Write::Put {
                    collection,
                    key,
                    value,
                } => {
                    tx.execute(
                        "INSERT INTO kv(collection, key, value, updated_at)
                         VALUES(?, ?, ?, ?)
                         ON CONFLICT(collection, key) DO UPDATE SET
                           value = excluded.value,
                           updated_at = excluded.updated_at",
                        (collection, key, value.to_string(), &now),
                    )?;
                }
                Write::Delete { collection, key } => {
                    tx.execute(
                        "DELETE FROM kv WHERE collection = ? AND key = ?",
                        (collection, key),
                    )?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}
