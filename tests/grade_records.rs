use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_workspace(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp workspace");
    p
}

fn spawn_daemon() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_rosterd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn rosterd");
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
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
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
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> &str {
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false));
    value["error"]["code"].as_str().expect("error code")
}

/// Select a workspace, sign in a teacher and provision one student.
fn bootstrap(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    prefix: &str,
) -> String {
    let workspace = temp_workspace(prefix);
    request_ok(
        stdin,
        reader,
        "b1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    request_ok(
        stdin,
        reader,
        "b2",
        "auth.register",
        json!({ "email": "t@school.test", "password": "pw-teacher", "role": "teacher", "name": "Mr T" }),
    );
    request_ok(
        stdin,
        reader,
        "b3",
        "auth.signIn",
        json!({ "email": "t@school.test", "password": "pw-teacher", "role": "teacher" }),
    );
    let created = request_ok(
        stdin,
        reader,
        "b4",
        "students.create",
        json!({ "name": "Ana", "email": "ana@school.test", "password": "pw-ana", "class": "10A" }),
    );
    created["studentId"].as_str().expect("studentId").to_string()
}

#[test]
fn grade_roundtrip_overwrites_and_self_heals_subject() {
    let (mut child, mut stdin, mut reader) = spawn_daemon();
    let sid = bootstrap(&mut stdin, &mut reader, "rosterd-grade-roundtrip");

    let write = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "grades.set",
        json!({ "studentId": sid, "subject": "Math", "grade": 88, "date": "2024-01-01" }),
    );
    assert_eq!(write["key"], "math_2024-01-01");
    assert_eq!(write["slug"], "math");

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "grades.list",
        json!({ "studentId": sid }),
    );
    let grades = listed["grades"].as_array().expect("grades array");
    assert_eq!(grades.len(), 1);
    assert_eq!(grades[0]["grade"], 88.0);
    assert_eq!(grades[0]["subjectSlug"], "math");

    // Same subject + date overwrites (grade correction), never duplicates.
    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "grades.set",
        json!({ "studentId": sid, "subject": "Math", "grade": 92, "date": "2024-01-01" }),
    );
    let corrected = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "grades.list",
        json!({ "studentId": sid }),
    );
    let grades = corrected["grades"].as_array().expect("grades array");
    assert_eq!(grades.len(), 1);
    assert_eq!(grades[0]["grade"], 92.0);

    // A different date for the same subject coexists.
    request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "grades.set",
        json!({ "studentId": sid, "subject": "Math", "grade": 75, "date": "2024-01-02" }),
    );
    let two = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "grades.list",
        json!({ "studentId": sid }),
    );
    assert_eq!(two["grades"].as_array().expect("grades array").len(), 2);

    // The subject was upserted alongside the first grade.
    let subjects = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "subjects.list",
        json!({ "studentId": sid }),
    );
    assert_eq!(
        subjects["subjects"],
        json!([{ "slug": "math", "name": "Math" }])
    );

    request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "grades.delete",
        json!({ "studentId": sid, "subject": "Math", "date": "2024-01-02" }),
    );
    // Deleting the same key again is a no-op, not an error.
    request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "grades.delete",
        json!({ "studentId": sid, "subject": "Math", "date": "2024-01-02" }),
    );
    let after = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "grades.list",
        json!({ "studentId": sid }),
    );
    assert_eq!(after["grades"].as_array().expect("grades array").len(), 1);

    let _ = child.kill();
}

#[test]
fn invalid_grade_writes_are_rejected() {
    let (mut child, mut stdin, mut reader) = spawn_daemon();
    let sid = bootstrap(&mut stdin, &mut reader, "rosterd-grade-invalid");

    let empty = request(
        &mut stdin,
        &mut reader,
        "1",
        "grades.set",
        json!({ "studentId": sid, "subject": "!!!", "grade": 50, "date": "2024-01-01" }),
    );
    assert_eq!(error_code(&empty), "empty_subject");

    let bad_date = request(
        &mut stdin,
        &mut reader,
        "2",
        "grades.set",
        json!({ "studentId": sid, "subject": "Math", "grade": 50, "date": "01/02/2024" }),
    );
    assert_eq!(error_code(&bad_date), "bad_date");

    let not_numeric = request(
        &mut stdin,
        &mut reader,
        "3",
        "grades.set",
        json!({ "studentId": sid, "subject": "Math", "grade": "A+", "date": "2024-01-01" }),
    );
    assert_eq!(error_code(&not_numeric), "bad_params");

    let _ = child.kill();
}

#[test]
fn overall_average_weights_every_record() {
    let (mut child, mut stdin, mut reader) = spawn_daemon();
    let sid = bootstrap(&mut stdin, &mut reader, "rosterd-grade-summary");

    for (i, (subject, grade, date)) in [
        ("Math", 80, "2024-01-01"),
        ("Math", 90, "2024-01-02"),
        ("Science", 100, "2024-01-03"),
    ]
    .iter()
    .enumerate()
    {
        request_ok(
            &mut stdin,
            &mut reader,
            &format!("g{i}"),
            "grades.set",
            json!({ "studentId": sid, "subject": subject, "grade": grade, "date": date }),
        );
    }

    let summary = request_ok(
        &mut stdin,
        &mut reader,
        "s",
        "summary.student",
        json!({ "studentId": sid }),
    );
    // Weighted over all three records: (80+90+100)/3, not the 92.5 a
    // mean-of-means would give.
    assert_eq!(summary["grades"]["overallAvg"], 90.0);
    let per_subject = summary["grades"]["perSubject"].as_array().expect("groups");
    assert_eq!(per_subject.len(), 2);
    // Group order follows the listing order, so look groups up by name.
    let group = |name: &str| {
        per_subject
            .iter()
            .find(|g| g["subject"] == name)
            .unwrap_or_else(|| panic!("no group for {name}"))
    };
    assert_eq!(group("Math")["avg"], 85.0);
    assert_eq!(group("Math")["count"], 2);
    assert_eq!(group("Science")["avg"], 100.0);
    assert_eq!(group("Science")["count"], 1);

    let _ = child.kill();
}
