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
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> &str {
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false));
    value["error"]["code"].as_str().expect("error code")
}

#[test]
fn role_mismatch_forces_sign_out() {
    let workspace = temp_workspace("rosterd-role-gate");
    let (mut child, mut stdin, mut reader) = spawn_daemon();

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "auth.register",
        json!({ "email": "t@school.test", "password": "pw-teacher", "role": "teacher", "name": "Mr T" }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "auth.signIn",
        json!({ "email": "t@school.test", "password": "pw-teacher", "role": "teacher" }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "students.create",
        json!({ "name": "Ana", "email": "ana@school.test", "password": "pw-ana", "class": "10A" }),
    );
    request_ok(&mut stdin, &mut reader, "5", "auth.signOut", json!({}));

    // A student credential signing in through the teacher entry point is
    // bounced and left unauthenticated.
    let resp = request(
        &mut stdin,
        &mut reader,
        "6",
        "auth.signIn",
        json!({ "email": "ana@school.test", "password": "pw-ana", "role": "teacher" }),
    );
    assert_eq!(error_code(&resp), "role_mismatch");
    let current = request_ok(&mut stdin, &mut reader, "7", "auth.current", json!({}));
    assert!(current["principal"].is_null());

    // The same credential through the right entry point works.
    let signed = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "auth.signIn",
        json!({ "email": "ana@school.test", "password": "pw-ana", "role": "student" }),
    );
    assert_eq!(signed["role"], "student");

    let _ = child.kill();
}

#[test]
fn credential_failures_are_surfaced_inline() {
    let workspace = temp_workspace("rosterd-auth-failures");
    let (mut child, mut stdin, mut reader) = spawn_daemon();

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "auth.register",
        json!({ "email": "t@school.test", "password": "pw-teacher", "role": "teacher", "name": "Mr T" }),
    );

    let wrong_pw = request(
        &mut stdin,
        &mut reader,
        "3",
        "auth.signIn",
        json!({ "email": "t@school.test", "password": "nope", "role": "teacher" }),
    );
    assert_eq!(error_code(&wrong_pw), "auth_failed");

    let unknown = request(
        &mut stdin,
        &mut reader,
        "4",
        "auth.signIn",
        json!({ "email": "who@school.test", "password": "x", "role": "teacher" }),
    );
    assert_eq!(error_code(&unknown), "auth_failed");

    let duplicate = request(
        &mut stdin,
        &mut reader,
        "5",
        "auth.register",
        json!({ "email": "T@School.Test", "password": "again", "role": "teacher", "name": "Imposter" }),
    );
    assert_eq!(error_code(&duplicate), "email_in_use");

    let _ = child.kill();
}

#[test]
fn requests_require_workspace_and_session() {
    let (mut child, mut stdin, mut reader) = spawn_daemon();

    let no_ws = request(
        &mut stdin,
        &mut reader,
        "1",
        "auth.signIn",
        json!({ "email": "t@school.test", "password": "pw", "role": "teacher" }),
    );
    assert_eq!(error_code(&no_ws), "no_workspace");

    let workspace = temp_workspace("rosterd-session-required");
    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let unsigned = request(
        &mut stdin,
        &mut reader,
        "3",
        "students.list",
        json!({}),
    );
    assert_eq!(error_code(&unsigned), "not_signed_in");

    let _ = child.kill();
}
