use chrono::NaiveDate;
use rusqlite::Connection;

use super::error::{err, ok};
use super::types::{AppState, Request};
use crate::attendance::{AttendanceError, StatusCode};
use crate::store::StoreError;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<AttendanceError> for HandlerErr {
    fn from(e: AttendanceError) -> Self {
        let details = match &e {
            // The session stays in create mode; it has to be reopened to edit.
            AttendanceError::DuplicateRecord { key } => {
                Some(serde_json::json!({ "key": key, "reopen": true }))
            }
            _ => None,
        };
        HandlerErr {
            code: e.code(),
            message: e.to_string(),
            details,
        }
    }
}

impl From<StoreError> for HandlerErr {
    fn from(e: StoreError) -> Self {
        AttendanceError::from(e).into()
    }
}

pub fn respond(req: &Request, result: Result<serde_json::Value, HandlerErr>) -> serde_json::Value {
    match result {
        Ok(value) => ok(&req.id, value),
        Err(error) => error.response(&req.id),
    }
}

pub fn db_conn(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn optional_str(params: &serde_json::Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => match v.as_str().map(str::trim) {
            Some("") => Ok(None),
            Some(s) => Ok(Some(s.to_string())),
            None => Err(HandlerErr::bad_params(format!("{} must be a string", key))),
        },
    }
}

pub fn parse_date(raw: &str, key: &str) -> Result<NaiveDate, HandlerErr> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        HandlerErr::bad_params(format!("{} must be YYYY-MM-DD", key))
            .with_details(serde_json::json!({ key: raw }))
    })
}

/// A required `YYYY-MM-DD` parameter, returned in canonical form.
pub fn required_date(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    let raw = required_str(params, key)?;
    Ok(parse_date(&raw, key)?.format("%Y-%m-%d").to_string())
}

pub fn required_status(params: &serde_json::Value, key: &str) -> Result<StatusCode, HandlerErr> {
    let raw = required_str(params, key)?;
    StatusCode::parse(&raw).ok_or_else(|| {
        HandlerErr::bad_params(format!("{} must be one of: H, S, I, A", key))
            .with_details(serde_json::json!({ key: raw }))
    })
}
