use std::collections::HashMap;

use super::{MeetingCount, RecordKey, StudentAttendanceRecord, StudentAttendanceRow};

/// Builds the editable matrix for `key` from the current roster.
///
/// Rows follow `current_roster` order. A persisted row is reused only when its
/// slot count equals `meeting_count`; a row sized for another week format is
/// reset to all-present rather than padded or truncated. Students no longer on
/// the roster are left out of the matrix but stay in storage until the next
/// commit replaces the record.
pub fn build_editable_matrix(
    key: &RecordKey,
    current_roster: &[String],
    meeting_count: MeetingCount,
    persisted: Option<&StudentAttendanceRecord>,
) -> Vec<StudentAttendanceRow> {
    let persisted = persisted.filter(|record| {
        let matches = record.id == key.as_str();
        if !matches {
            tracing::warn!(key = %key, record_id = %record.id, "ignoring record stored under another key");
        }
        matches
    });

    let prior: HashMap<&str, &StudentAttendanceRow> = persisted
        .map(|record| {
            record
                .rows
                .iter()
                .map(|row| (row.student_id.as_str(), row))
                .collect()
        })
        .unwrap_or_default();

    current_roster
        .iter()
        .map(|student_id| match prior.get(student_id.as_str()) {
            Some(row) if row.status.len() == meeting_count.slots() => (*row).clone(),
            Some(row) => {
                tracing::debug!(
                    key = %key,
                    student_id = %student_id,
                    stored_slots = row.status.len(),
                    meeting_count = meeting_count.slots(),
                    "week format changed; resetting row"
                );
                StudentAttendanceRow::present(student_id.clone(), meeting_count)
            }
            None => StudentAttendanceRow::present(student_id.clone(), meeting_count),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::StatusCode::{Alpa as A, Hadir as H, Ijin as I, Sakit as S};

    fn record(key: &RecordKey, rows: Vec<StudentAttendanceRow>) -> StudentAttendanceRecord {
        StudentAttendanceRecord {
            id: key.as_str().to_string(),
            class_id: key.class_id().to_string(),
            date: key.date().to_string(),
            rows,
        }
    }

    fn row(id: &str, status: &[crate::attendance::StatusCode]) -> StudentAttendanceRow {
        StudentAttendanceRow {
            student_id: id.to_string(),
            status: status.iter().copied().map(Some).collect(),
        }
    }

    fn roster(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn fresh_record_defaults_everyone_to_present() {
        let key = RecordKey::resolve("X-1", "2024-03-01");
        let rows = build_editable_matrix(&key, &roster(&["S1", "S2"]), MeetingCount::Six, None);
        assert_eq!(rows.len(), 2);
        for r in &rows {
            assert_eq!(r.status, vec![Some(H); 6]);
        }
    }

    #[test]
    fn overlap_is_preserved_and_newcomers_default() {
        let key = RecordKey::resolve("X-1", "2024-03-01");
        let stored = record(
            &key,
            vec![row("A", &[H, S, H, H, I]), row("B", &[A, A, H, H, H])],
        );
        let rows = build_editable_matrix(
            &key,
            &roster(&["A", "B", "C"]),
            MeetingCount::Five,
            Some(&stored),
        );
        assert_eq!(rows[0], row("A", &[H, S, H, H, I]));
        assert_eq!(rows[1], row("B", &[A, A, H, H, H]));
        assert_eq!(rows[2], row("C", &[H, H, H, H, H]));
    }

    #[test]
    fn week_format_change_discards_stale_statuses() {
        let key = RecordKey::resolve("X-1", "2024-03-01");
        let stored = record(&key, vec![row("A", &[A, A, A, A, A])]);
        let rows = build_editable_matrix(&key, &roster(&["A"]), MeetingCount::Six, Some(&stored));
        assert_eq!(rows, vec![row("A", &[H, H, H, H, H, H])]);
    }

    #[test]
    fn departed_students_are_left_out_of_the_view_only() {
        let key = RecordKey::resolve("X-1", "2024-03-01");
        let stored = record(
            &key,
            vec![row("A", &[H, H, H, H, H]), row("GONE", &[A, A, A, A, A])],
        );
        let rows = build_editable_matrix(&key, &roster(&["A"]), MeetingCount::Five, Some(&stored));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].student_id, "A");
        assert_eq!(stored.rows.len(), 2);
    }

    #[test]
    fn undefined_slots_survive_when_length_matches() {
        let key = RecordKey::resolve("X-1", "2024-03-01");
        let mut partial = row("A", &[H, H, H, H, H]);
        partial.status[2] = None;
        let stored = record(&key, vec![partial.clone()]);
        let rows = build_editable_matrix(&key, &roster(&["A"]), MeetingCount::Five, Some(&stored));
        assert_eq!(rows, vec![partial]);
    }

    #[test]
    fn record_under_a_different_key_is_ignored() {
        let key = RecordKey::resolve("X-1", "2024-03-01");
        let other = RecordKey::resolve("X-1", "2024-03-02");
        let stored = record(&other, vec![row("A", &[A, A, A, A, A])]);
        let rows = build_editable_matrix(&key, &roster(&["A"]), MeetingCount::Five, Some(&stored));
        assert_eq!(rows, vec![row("A", &[H, H, H, H, H])]);
    }
}
