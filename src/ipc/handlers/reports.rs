use crate::attendance::aggregate::{aggregate_students, aggregate_teachers, week_bounds, DatePredicate};
use crate::attendance::upsert::AttendanceBook;
use crate::directory::Directory;
use crate::ipc::helpers::{db_conn, optional_str, parse_date, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::SqliteStore;
use chrono::NaiveDate;
use serde_json::json;

fn parse_month_key(month: &str) -> Result<String, HandlerErr> {
    let t = month.trim();
    let Some((y, m)) = t.split_once('-') else {
        return Err(HandlerErr::bad_params("month must be YYYY-MM"));
    };
    let year = y
        .parse::<i32>()
        .map_err(|_| HandlerErr::bad_params("month year must be numeric"))?;
    let month_num = m
        .parse::<u32>()
        .map_err(|_| HandlerErr::bad_params("month must be YYYY-MM"))?;
    if !(1..=12).contains(&month_num) || y.len() != 4 {
        return Err(HandlerErr::bad_params("month must be YYYY-MM with month between 01 and 12"));
    }
    Ok(format!("{:04}-{:02}", year, month_num))
}

/// Reads `params.period`; with no period the current calendar month is used.
fn parse_period(params: &serde_json::Value, today: NaiveDate) -> Result<DatePredicate, HandlerErr> {
    let period = match params.get("period") {
        None | Some(serde_json::Value::Null) => return Ok(DatePredicate::month_of(today)),
        Some(p) if p.is_object() => p,
        Some(_) => return Err(HandlerErr::bad_params("period must be an object")),
    };
    let kind = optional_str(period, "kind")?.unwrap_or_else(|| "month".to_string());
    match kind.as_str() {
        "all" => Ok(DatePredicate::All),
        "range" => {
            // Bounds compare as text, so they are stored zero-padded.
            let bound = |name: &str| -> Result<Option<String>, HandlerErr> {
                match optional_str(period, name)? {
                    Some(v) => Ok(Some(parse_date(&v, name)?.format("%Y-%m-%d").to_string())),
                    None => Ok(None),
                }
            };
            Ok(DatePredicate::Range {
                start: bound("start")?,
                end: bound("end")?,
            })
        }
        "month" => match optional_str(period, "month")? {
            Some(m) => Ok(DatePredicate::Month(parse_month_key(&m)?)),
            None => Ok(DatePredicate::month_of(today)),
        },
        "week" => {
            let today = match optional_str(period, "today")? {
                Some(d) => parse_date(&d, "today")?,
                None => today,
            };
            Ok(DatePredicate::Week { today })
        }
        other => Err(HandlerErr::bad_params("period.kind must be one of: all, range, month, week")
            .with_details(json!({ "kind": other }))),
    }
}

fn describe_period(predicate: &DatePredicate) -> serde_json::Value {
    match predicate {
        DatePredicate::All => json!({ "kind": "all" }),
        DatePredicate::Range { start, end } => json!({ "kind": "range", "start": start, "end": end }),
        DatePredicate::Month(m) => json!({ "kind": "month", "month": m }),
        DatePredicate::Week { today } => {
            let (first, last) = week_bounds(*today);
            json!({
                "kind": "week",
                "start": first.format("%Y-%m-%d").to_string(),
                "end": last.format("%Y-%m-%d").to_string()
            })
        }
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn student_attendance_report(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = optional_str(params, "classId")?;
    let predicate = parse_period(params, today())?;
    let store = SqliteStore::new(db_conn(state)?);
    let records = AttendanceBook::new(&store).student_records()?;
    let refs = Directory::new(&store).reference_index()?;
    let rows = aggregate_students(&records, class_id.as_deref(), &predicate, &refs);
    tracing::debug!(rows = rows.len(), records = records.len(), "student recap built");
    Ok(json!({
        "classId": class_id,
        "period": describe_period(&predicate),
        "rows": rows
    }))
}

fn teacher_attendance_report(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let predicate = parse_period(params, today())?;
    let store = SqliteStore::new(db_conn(state)?);
    let records = AttendanceBook::new(&store).teacher_records()?;
    let refs = Directory::new(&store).reference_index()?;
    let rows = aggregate_teachers(&records, &predicate, &refs);
    tracing::debug!(rows = rows.len(), records = records.len(), "teacher recap built");
    Ok(json!({
        "period": describe_period(&predicate),
        "rows": rows
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "reports.studentAttendance" => student_attendance_report(state, &req.params),
        "reports.teacherAttendance" => teacher_attendance_report(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("date")
    }

    #[test]
    fn missing_period_defaults_to_current_month() {
        let p = parse_period(&json!({}), day(2024, 3, 9)).ok().expect("period");
        assert_eq!(p, DatePredicate::Month("2024-03".into()));
    }

    #[test]
    fn period_kinds_parse() {
        let today = day(2024, 3, 6);
        let range = parse_period(
            &json!({ "period": { "kind": "range", "start": "2024-03-01", "end": "2024-03-02" } }),
            today,
        )
        .ok()
        .expect("range");
        assert_eq!(range, DatePredicate::range("2024-03-01", "2024-03-02"));

        let month = parse_period(&json!({ "period": { "kind": "month", "month": "2024-2" } }), today)
            .ok()
            .expect("month");
        assert_eq!(month, DatePredicate::Month("2024-02".into()));

        let week = parse_period(&json!({ "period": { "kind": "week" } }), today)
            .ok()
            .expect("week");
        assert_eq!(week, DatePredicate::Week { today });
        assert_eq!(describe_period(&week)["start"], "2024-03-03");
    }

    #[test]
    fn unpadded_range_bounds_are_normalized() {
        let range = parse_period(
            &json!({ "period": { "kind": "range", "start": "2024-3-1", "end": "2024-3-31" } }),
            day(2024, 3, 6),
        )
        .ok()
        .expect("range");
        assert_eq!(range, DatePredicate::range("2024-03-01", "2024-03-31"));
        assert!(range.matches("2024-03-15"));
        assert!(!range.matches("2024-04-01"));

        let open = parse_period(
            &json!({ "period": { "kind": "range", "end": "2024-3-9" } }),
            day(2024, 3, 6),
        )
        .ok()
        .expect("open range");
        assert_eq!(
            open,
            DatePredicate::Range {
                start: None,
                end: Some("2024-03-09".into())
            }
        );
    }

    #[test]
    fn bad_periods_are_rejected() {
        let today = day(2024, 3, 6);
        for params in [
            json!({ "period": { "kind": "fortnight" } }),
            json!({ "period": { "kind": "month", "month": "2024-13" } }),
            json!({ "period": { "kind": "range", "start": "03/01/2024", "end": "2024-03-02" } }),
            json!({ "period": "month" }),
        ] {
            let e = parse_period(&params, today).err().expect("error");
            assert_eq!(e.code, "bad_params");
        }
    }
}
