use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_lapkesd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn lapkesd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn put(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    collection: &str,
    key: &str,
    value: serde_json::Value,
) {
    request_ok(
        stdin,
        reader,
        &format!("put-{}-{}", collection, key),
        "store.put",
        json!({ "collection": collection, "key": key, "value": value }),
    );
}

/// Opens a form, applies `marks` as (student, meeting, status) and saves it.
fn record_session(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    class_id: &str,
    date: &str,
    marks: &[(&str, u64, &str)],
    teachers: serde_json::Value,
) {
    let opened = request_ok(
        stdin,
        reader,
        &format!("open-{}-{}", class_id, date),
        "attendance.open",
        json!({ "classId": class_id, "date": date }),
    );
    let session = opened["sessionId"].as_str().expect("sessionId").to_string();
    for (i, (student, meeting, status)) in marks.iter().enumerate() {
        let updated = request_ok(
            stdin,
            reader,
            &format!("mark-{}-{}", date, i),
            "attendance.setCell",
            json!({
                "sessionId": session,
                "studentId": student,
                "meetingIndex": meeting,
                "status": status
            }),
        );
        assert_eq!(updated["updated"], true);
    }
    request_ok(
        stdin,
        reader,
        &format!("save-{}-{}", class_id, date),
        "attendance.save",
        json!({ "sessionId": session, "teachers": teachers }),
    );
}

fn seed_school(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>) {
    put(stdin, reader, "classes", "X-1", json!({ "name": "X IPA 1" }));
    put(stdin, reader, "classes", "Y-1", json!({ "name": "XI IPS 1" }));
    put(stdin, reader, "students", "S1", json!({ "name": "Budi", "classId": "X-1" }));
    put(stdin, reader, "students", "S2", json!({ "name": "Citra", "classId": "X-1" }));
    put(stdin, reader, "students", "S3", json!({ "name": "Dewi", "classId": "Y-1" }));
    put(stdin, reader, "teachers", "T1", json!({ "name": "Pak Ahmad", "status": "PNS", "nip": "1987" }));
    put(stdin, reader, "teachers", "T2", json!({ "name": "Bu Sari" }));
}

fn row_for<'a>(rows: &'a serde_json::Value, student_id: &str) -> Option<&'a serde_json::Value> {
    rows.as_array()?
        .iter()
        .find(|r| r["studentId"] == student_id)
}

#[test]
fn student_and_teacher_recaps_over_saved_sessions() {
    let workspace = temp_dir("lapkes-reports");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    seed_school(&mut stdin, &mut reader);

    record_session(
        &mut stdin,
        &mut reader,
        "X-1",
        "2024-03-01",
        &[("S1", 1, "S"), ("S2", 1, "I"), ("S2", 2, "A")],
        json!([{ "teacherId": "T1", "subjectId": "MTK", "meetingsTaught": 3 }]),
    );
    record_session(
        &mut stdin,
        &mut reader,
        "X-1",
        "2024-03-08",
        &[("S1", 0, "A")],
        json!([
            { "teacherId": "T1", "subjectId": "MTK", "meetingsTaught": 2 },
            { "teacherId": "T2", "subjectId": "BIO" }
        ]),
    );
    record_session(
        &mut stdin,
        &mut reader,
        "X-1",
        "2024-04-01",
        &[],
        json!([{ "teacherId": "T2", "subjectId": "BIO", "meetingsTaught": 4 }]),
    );

    let day = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "reports.studentAttendance",
        json!({
            "classId": "X-1",
            "period": { "kind": "range", "start": "2024-03-01", "end": "2024-03-01" }
        }),
    );
    let rows = &day["rows"];
    assert_eq!(rows.as_array().map(|r| r.len()), Some(2));
    assert_eq!(rows[0]["studentName"], "Budi");
    assert_eq!(rows[0]["className"], "X IPA 1");
    let s1 = row_for(rows, "S1").expect("S1");
    assert_eq!((&s1["H"], &s1["S"], &s1["I"], &s1["A"]), (&json!(4), &json!(1), &json!(0), &json!(0)));
    let s2 = row_for(rows, "S2").expect("S2");
    assert_eq!((&s2["H"], &s2["S"], &s2["I"], &s2["A"]), (&json!(3), &json!(0), &json!(1), &json!(1)));

    let march = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "reports.studentAttendance",
        json!({ "classId": "X-1", "period": { "kind": "month", "month": "2024-03" } }),
    );
    let s1 = row_for(&march["rows"], "S1").expect("S1");
    assert_eq!((&s1["H"], &s1["S"], &s1["A"]), (&json!(8), &json!(1), &json!(1)));

    let everything = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "reports.studentAttendance",
        json!({ "period": { "kind": "all" } }),
    );
    let s2 = row_for(&everything["rows"], "S2").expect("S2");
    assert_eq!(s2["H"], 13);

    let teachers = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "reports.teacherAttendance",
        json!({ "period": { "kind": "month", "month": "2024-03" } }),
    );
    assert_eq!(teachers["period"]["month"], "2024-03");
    let rows = teachers["rows"].as_array().expect("rows");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["teacherName"], "Bu Sari");
    assert_eq!(rows[0]["totalMeetings"], 1);
    assert_eq!(rows[1]["teacherName"], "Pak Ahmad");
    assert_eq!(rows[1]["totalMeetings"], 5);
    assert_eq!(rows[1]["nip"], "1987");

    let open_ended = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "reports.teacherAttendance",
        json!({ "period": { "kind": "range", "start": "2024-03-05" } }),
    );
    let rows = open_ended["rows"].as_array().expect("rows");
    assert_eq!(rows[0]["totalMeetings"], 5);
    assert_eq!(rows[1]["totalMeetings"], 2);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn recaps_skip_deleted_classes_and_transferred_students() {
    let workspace = temp_dir("lapkes-reports-dangling");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    seed_school(&mut stdin, &mut reader);

    let teachers = json!([{ "teacherId": "T1", "subjectId": "MTK" }]);
    record_session(&mut stdin, &mut reader, "X-1", "2024-05-02", &[], teachers.clone());
    record_session(&mut stdin, &mut reader, "Y-1", "2024-05-03", &[], teachers.clone());
    record_session(&mut stdin, &mut reader, "X-1", "2024-05-06", &[], teachers);

    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "store.delete",
        json!({ "collection": "classes", "key": "Y-1" }),
    );
    put(
        &mut stdin,
        &mut reader,
        "students",
        "S2",
        json!({ "name": "Citra", "classId": "X-1", "transferred": true }),
    );

    let recap = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "reports.studentAttendance",
        json!({ "period": { "kind": "all" } }),
    );
    let rows = recap["rows"].as_array().expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["studentId"], "S1");
    assert_eq!(rows[0]["H"], 10);

    let listed = request_ok(&mut stdin, &mut reader, "4", "attendance.list", json!({}));
    let records = listed["records"].as_array().expect("records");
    let dates: Vec<&str> = records
        .iter()
        .filter_map(|r| r["date"].as_str())
        .collect();
    assert_eq!(dates, vec!["2024-05-06", "2024-05-03", "2024-05-02"]);
    assert!(records[1]["className"].is_null());
    assert_eq!(records[0]["className"], "X IPA 1");
    assert_eq!(records[0]["H"], 10);

    let filtered = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "attendance.list",
        json!({ "classId": "Y-1" }),
    );
    assert_eq!(filtered["records"].as_array().map(|r| r.len()), Some(1));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
