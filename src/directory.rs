//! Read-only views of the reference data the attendance core depends on:
//! class rosters, the school's week format, and name lookups for reports.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::attendance::MeetingCount;
use crate::store::{KeyValueStore, StoreError, CLASSES, SCHOOL, STUDENTS, TEACHERS};

pub const SCHOOL_PROFILE_KEY: &str = "profile";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub class_id: Option<String>,
    /// Set once the student has been transferred out of the school.
    #[serde(default)]
    pub transferred: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classroom {
    pub id: String,
    #[serde(default)]
    pub code: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub nip: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WeekFormat {
    #[default]
    FiveDay,
    SixDay,
}

impl WeekFormat {
    pub fn meeting_count(self) -> MeetingCount {
        match self {
            WeekFormat::FiveDay => MeetingCount::Five,
            WeekFormat::SixDay => MeetingCount::Six,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub week_format: WeekFormat,
}

pub struct Directory<'a, S: KeyValueStore> {
    store: &'a S,
}

impl<'a, S: KeyValueStore> Directory<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn school_profile(&self) -> Result<SchoolProfile, StoreError> {
        match self.store.get_as(SCHOOL, SCHOOL_PROFILE_KEY) {
            Ok(p) => Ok(p.unwrap_or_default()),
            Err(StoreError::Json(e)) => {
                tracing::warn!(error = %e, "school profile unreadable; assuming five-day week");
                Ok(SchoolProfile::default())
            }
            Err(e) => Err(e),
        }
    }

    pub fn current_meeting_count(&self) -> Result<MeetingCount, StoreError> {
        Ok(self.school_profile()?.week_format.meeting_count())
    }

    /// Students currently in the class, excluding transfers, ordered by name.
    pub fn current_roster(&self, class_id: &str) -> Result<Vec<Student>, StoreError> {
        let mut roster: Vec<Student> = self
            .store
            .list_as::<Student>(STUDENTS)?
            .into_iter()
            .filter(|s| s.class_id.as_deref() == Some(class_id) && !s.transferred)
            .collect();
        roster.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(roster)
    }

    pub fn reference_index(&self) -> Result<ReferenceIndex, StoreError> {
        Ok(ReferenceIndex::from_parts(
            self.store.list_as(STUDENTS)?,
            self.store.list_as(CLASSES)?,
            self.store.list_as(TEACHERS)?,
        ))
    }
}

/// Point-in-time lookup tables used while building reports.
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    students: HashMap<String, Student>,
    classes: HashMap<String, Classroom>,
    teachers: HashMap<String, Teacher>,
}

impl ReferenceIndex {
    pub fn from_parts(
        students: Vec<Student>,
        classes: Vec<Classroom>,
        teachers: Vec<Teacher>,
    ) -> Self {
        Self {
            students: students.into_iter().map(|s| (s.id.clone(), s)).collect(),
            classes: classes.into_iter().map(|c| (c.id.clone(), c)).collect(),
            teachers: teachers.into_iter().map(|t| (t.id.clone(), t)).collect(),
        }
    }

    pub fn student(&self, id: &str) -> Option<&Student> {
        self.students.get(id)
    }

    pub fn classroom(&self, id: &str) -> Option<&Classroom> {
        self.classes.get(id)
    }

    pub fn teacher(&self, id: &str) -> Option<&Teacher> {
        self.teachers.get(id)
    }
}
