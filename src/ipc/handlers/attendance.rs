use crate::attendance::aggregate::summarize_records;
use crate::attendance::reconcile::build_editable_matrix;
use crate::attendance::upsert::{AttendanceBook, TeacherEntryDraft};
use crate::attendance::{editor, RecordKey, SaveMode};
use crate::directory::Directory;
use crate::ipc::helpers::{
    db_conn, optional_str, required_date, required_status, required_str, respond, HandlerErr,
};
use crate::ipc::types::{AppState, EditSession, Request};
use crate::store::{KeyValueStore, SqliteStore, CLASSES};
use serde_json::json;
use uuid::Uuid;

fn session_not_found(session_id: &str) -> HandlerErr {
    HandlerErr::new("not_found", "edit session not found")
        .with_details(json!({ "sessionId": session_id }))
}

fn attendance_open(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = required_str(params, "classId")?;
    let date = required_date(params, "date")?;
    let key = RecordKey::resolve(&class_id, &date);

    let (session, students_json, teachers) = {
        let store = SqliteStore::new(db_conn(state)?);
        if !store.contains(CLASSES, &class_id)? {
            return Err(HandlerErr::new("not_found", "class not found")
                .with_details(json!({ "classId": class_id })));
        }
        let directory = Directory::new(&store);
        let book = AttendanceBook::new(&store);

        let meeting_count = directory.current_meeting_count()?;
        let roster = directory.current_roster(&class_id)?;
        let roster_ids: Vec<String> = roster.iter().map(|s| s.id.clone()).collect();
        let (students, teachers) = book.load(&key)?;
        let mode = if students.is_some() || teachers.is_some() {
            SaveMode::Edit
        } else {
            SaveMode::Create
        };
        let rows = build_editable_matrix(&key, &roster_ids, meeting_count, students.as_ref());
        let students_json: Vec<serde_json::Value> = roster
            .iter()
            .map(|s| json!({ "id": s.id, "name": s.name }))
            .collect();
        let teachers = teachers.map(|t| t.entries).unwrap_or_default();
        (
            EditSession {
                key,
                mode,
                meeting_count,
                rows,
            },
            students_json,
            teachers,
        )
    };

    let session_id = Uuid::new_v4().to_string();
    let result = json!({
        "sessionId": session_id,
        "key": session.key.as_str(),
        "classId": session.key.class_id(),
        "date": session.key.date(),
        "editMode": session.mode.is_edit(),
        "meetingCount": session.meeting_count.slots(),
        "students": students_json,
        "rows": session.rows,
        "teachers": teachers,
    });
    tracing::debug!(session_id = %session_id, key = %session.key, edit = session.mode.is_edit(), "edit session opened");
    state.sessions.insert(session_id, session);
    Ok(result)
}

fn attendance_set_cell(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let session_id = required_str(params, "sessionId")?;
    let student_id = required_str(params, "studentId")?;
    let status = required_status(params, "status")?;
    let meeting_index = params
        .get("meetingIndex")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| HandlerErr::bad_params("missing meetingIndex"))?;
    let session = state
        .sessions
        .get_mut(&session_id)
        .ok_or_else(|| session_not_found(&session_id))?;
    let slots = session.meeting_count.slots();
    let meeting_index = usize::try_from(meeting_index)
        .ok()
        .filter(|i| *i < slots)
        .ok_or_else(|| {
            HandlerErr::bad_params("meetingIndex out of range")
                .with_details(json!({ "meetingIndex": meeting_index, "meetingCount": slots }))
        })?;
    let updated = editor::set_cell(&mut session.rows, &student_id, meeting_index, status);
    tracing::trace!(student_id = %student_id, meeting_index, status = status.code(), updated, "cell set");
    Ok(json!({ "updated": updated }))
}

fn attendance_set_all(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let session_id = required_str(params, "sessionId")?;
    let status = required_status(params, "status")?;
    let session = state
        .sessions
        .get_mut(&session_id)
        .ok_or_else(|| session_not_found(&session_id))?;
    editor::set_all(&mut session.rows, status);
    Ok(json!({ "rows": session.rows }))
}

fn attendance_cancel(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let session_id = required_str(params, "sessionId")?;
    let removed = state.sessions.remove(&session_id).is_some();
    Ok(json!({ "cancelled": removed }))
}

fn attendance_save(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let session_id = required_str(params, "sessionId")?;
    let drafts: Vec<TeacherEntryDraft> = match params.get("teachers") {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(v) => serde_json::from_value(v.clone()).map_err(|e| {
            HandlerErr::bad_params("teachers must be a list of teacher entries")
                .with_details(json!({ "error": e.to_string() }))
        })?,
    };

    let (key, created) = {
        let session = state
            .sessions
            .get(&session_id)
            .ok_or_else(|| session_not_found(&session_id))?;
        let store = SqliteStore::new(db_conn(state)?);
        let meeting_count = Directory::new(&store).current_meeting_count()?;
        AttendanceBook::new(&store).save(
            &session.key,
            session.rows.clone(),
            &drafts,
            session.mode,
            meeting_count,
        )?;
        (session.key.clone(), !session.mode.is_edit())
    };

    state.sessions.remove(&session_id);
    Ok(json!({ "key": key.as_str(), "created": created }))
}

fn attendance_delete(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = required_str(params, "classId")?;
    let date = required_date(params, "date")?;
    let key = RecordKey::resolve(&class_id, &date);
    let store = SqliteStore::new(db_conn(state)?);
    let deleted = AttendanceBook::new(&store).delete(&key)?;
    Ok(json!({ "key": key.as_str(), "deleted": deleted }))
}

fn attendance_list(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = optional_str(params, "classId")?;
    let store = SqliteStore::new(db_conn(state)?);
    let records = AttendanceBook::new(&store).student_records()?;
    let refs = Directory::new(&store).reference_index()?;
    let summaries = summarize_records(&records, class_id.as_deref(), &refs);
    Ok(json!({ "records": summaries }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "attendance.open" => attendance_open(state, &req.params),
        "attendance.setCell" => attendance_set_cell(state, &req.params),
        "attendance.setAll" => attendance_set_all(state, &req.params),
        "attendance.cancel" => attendance_cancel(state, &req.params),
        "attendance.save" => attendance_save(state, &req.params),
        "attendance.delete" => attendance_delete(state, &req.params),
        "attendance.list" => attendance_list(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}
