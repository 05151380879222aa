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
    let exe = env!("CARGO_BIN_EXE_sathachd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn sathachd");
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
    serde_json::from_str(line.trim()).expect("parse response json")
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "expected ok for {}: {}",
        method,
        value
    );
    value.get("result").cloned().expect("result")
}

fn roster() -> serde_json::Value {
    json!([
        {
            "studentId": "99001",
            "fullName": "Nguyễn Văn A",
            "nationalId": "079090000111",
            "licenseClass": "B2",
            "subjects": "L",
            "theoryScore": "ĐẠT"
        },
        {
            "studentId": "99002",
            "fullName": "Trần Thị B",
            "licenseClass": "B2",
            "subjects": "L",
            "theoryScore": "KHÔNG ĐẠT"
        }
    ])
}

#[test]
fn save_overwrite_patch_delete_roundtrip() {
    let workspace = temp_dir("sathach-sessions");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let saved = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "sessions.save",
        json!({
            "name": "Kỳ 1",
            "reportDate": "2024-05-01",
            "records": roster(),
            "meta": { "attendees": "Hội đồng A", "location": "Phòng 101" }
        }),
    );
    let session_id = saved["sessionId"].as_str().expect("sessionId").to_string();
    assert_eq!(saved["recordCount"].as_u64(), Some(2));
    assert_eq!(saved["grandTotal"]["finalPass"].as_u64(), Some(1));

    // Re-save with the same id overwrites wholesale.
    let resaved = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "sessions.save",
        json!({
            "sessionId": session_id,
            "name": "Kỳ 1 (đính chính)",
            "reportDate": "2024-05-02",
            "records": roster()
        }),
    );
    assert_eq!(resaved["sessionId"].as_str(), Some(session_id.as_str()));
    let listed = request_ok(&mut stdin, &mut reader, "4", "sessions.list", json!({}));
    let sessions = listed["sessions"].as_array().expect("sessions");
    assert_eq!(sessions.len(), 1, "same id must overwrite, not append");
    assert_eq!(sessions[0]["name"].as_str(), Some("Kỳ 1 (đính chính)"));
    assert_eq!(sessions[0]["reportDate"].as_str(), Some("2024-05-02"));

    // Identity correction: aggregates must stay untouched.
    let before = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "sessions.get",
        json!({ "sessionId": session_id }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "sessions.updateCandidate",
        json!({
            "sessionId": session_id,
            "studentId": "99002",
            "patch": { "fullName": "Trần Thị B (sửa)", "nationalId": "079190000222" }
        }),
    );
    let after = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "sessions.get",
        json!({ "sessionId": session_id }),
    );
    let patched = after["records"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["studentId"] == "99002")
        .expect("patched record");
    assert_eq!(patched["fullName"].as_str(), Some("Trần Thị B (sửa)"));
    assert_eq!(patched["nationalId"].as_str(), Some("079190000222"));
    assert_eq!(after["appData"], before["appData"]);

    // Bad report dates are refused.
    let bad = request(
        &mut stdin,
        &mut reader,
        "8",
        "sessions.save",
        json!({ "name": "x", "reportDate": "01/05/2024", "records": [] }),
    );
    assert_eq!(bad["error"]["code"].as_str(), Some("bad_params"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "sessions.delete",
        json!({ "sessionId": session_id }),
    );
    let gone = request(
        &mut stdin,
        &mut reader,
        "10",
        "sessions.get",
        json!({ "sessionId": session_id }),
    );
    assert_eq!(gone["error"]["code"].as_str(), Some("not_found"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
