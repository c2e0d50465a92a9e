use super::{StatusCode, StudentAttendanceRow};

/// Sets one (student, meeting) cell. Unknown students are ignored; the return
/// value reports whether a cell was written.
pub fn set_cell(
    rows: &mut [StudentAttendanceRow],
    student_id: &str,
    meeting_index: usize,
    status: StatusCode,
) -> bool {
    let Some(row) = rows.iter_mut().find(|r| r.student_id == student_id) else {
        return false;
    };
    match row.status.get_mut(meeting_index) {
        Some(slot) => {
            *slot = Some(status);
            true
        }
        None => false,
    }
}

/// Overwrites every slot of every row. Confirmation is the caller's job.
pub fn set_all(rows: &mut [StudentAttendanceRow], status: StatusCode) {
    for row in rows.iter_mut() {
        row.status.iter_mut().for_each(|slot| *slot = Some(status));
    }
}
