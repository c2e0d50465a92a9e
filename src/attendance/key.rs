use std::fmt;

/// Composite identity of one attendance session: `"<classId>-<date>"`.
///
/// The student-side and teacher-side records of a session share this key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    class_id: String,
    date: String,
    id: String,
}

impl RecordKey {
    /// `date` is expected to be `YYYY-MM-DD`; callers validate it upstream.
    pub fn resolve(class_id: &str, date: &str) -> Self {
        Self {
            class_id: class_id.to_string(),
            date: date.to_string(),
            id: format!("{}-{}", class_id, date),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }

    pub fn class_id(&self) -> &str {
        &self.class_id
    }

    pub fn date(&self) -> &str {
        &self.date
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}
