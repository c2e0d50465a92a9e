use crate::directory::{Directory, SCHOOL_PROFILE_KEY};
use crate::ipc::helpers::{db_conn, required_str, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::{
    KeyValueStore, SqliteStore, Write, REFERENCE_COLLECTIONS, SCHOOL, STUDENT_ATTENDANCE,
    TEACHER_ATTENDANCE,
};
use serde_json::json;

fn writable_collection(params: &serde_json::Value) -> Result<&'static str, HandlerErr> {
    let name = required_str(params, "collection")?;
    REFERENCE_COLLECTIONS
        .iter()
        .find(|c| **c == name)
        .copied()
        .ok_or_else(|| {
            HandlerErr::bad_params("collection is not writable through store methods")
                .with_details(json!({ "collection": name, "writable": REFERENCE_COLLECTIONS }))
        })
}

fn readable_collection(params: &serde_json::Value) -> Result<&'static str, HandlerErr> {
    let name = required_str(params, "collection")?;
    REFERENCE_COLLECTIONS
        .iter()
        .chain([STUDENT_ATTENDANCE, TEACHER_ATTENDANCE].iter())
        .find(|c| **c == name)
        .copied()
        .ok_or_else(|| {
            HandlerErr::bad_params("unknown collection").with_details(json!({ "collection": name }))
        })
}

fn store_get(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let collection = readable_collection(params)?;
    let key = required_str(params, "key")?;
    let store = SqliteStore::new(db_conn(state)?);
    let value = store.get(collection, &key)?;
    Ok(json!({ "value": value }))
}

fn store_list(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let collection = readable_collection(params)?;
    let store = SqliteStore::new(db_conn(state)?);
    let items: Vec<serde_json::Value> = store
        .list(collection)?
        .into_iter()
        .map(|(key, value)| json!({ "key": key, "value": value }))
        .collect();
    Ok(json!({ "items": items }))
}

fn store_put(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let collection = writable_collection(params)?;
    let key = required_str(params, "key")?;
    let Some(mut value) = params.get("value").filter(|v| v.is_object()).cloned() else {
        return Err(HandlerErr::bad_params("value must be an object"));
    };
    // Documents carry their own key as id, except the singleton school profile.
    if collection != SCHOOL {
        value["id"] = json!(key);
    }
    let store = SqliteStore::new(db_conn(state)?);
    store.apply(&[Write::Put {
        collection,
        key: key.clone(),
        value,
    }])?;
    Ok(json!({ "collection": collection, "key": key }))
}

fn store_delete(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let collection = writable_collection(params)?;
    let key = required_str(params, "key")?;
    let store = SqliteStore::new(db_conn(state)?);
    let existed = store.contains(collection, &key)?;
    if existed {
        store.apply(&[Write::delete(collection, key.clone())])?;
    }
    Ok(json!({ "deleted": existed }))
}

fn school_meeting_count(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let store = SqliteStore::new(db_conn(state)?);
    let profile = Directory::new(&store).school_profile()?;
    Ok(json!({
        "profileKey": SCHOOL_PROFILE_KEY,
        "weekFormat": profile.week_format,
        "meetingCount": profile.week_format.meeting_count().slots()
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "store.get" => store_get(state, &req.params),
        "store.list" => store_list(state, &req.params),
        "store.put" => store_put(state, &req.params),
        "store.delete" => store_delete(state, &req.params),
        "school.meetingCount" => school_meeting_count(state),
        _ => return None,
    };
    Some(respond(req, result))
}
