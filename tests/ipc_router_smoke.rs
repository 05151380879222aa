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
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "expected ok for {}: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or(json!({}))
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("sathach-router-smoke");
    let bundle_out = workspace.join("smoke-backup.bundle.zip");
    let csv_out = workspace.join("smoke-results.csv");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health.get("status").and_then(|v| v.as_str()), Some("ok"));

    // Store-backed methods before a workspace is selected must refuse.
    let early = request(&mut stdin, &mut reader, "1b", "sessions.list", json!({}));
    assert_eq!(early.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        early["error"]["code"].as_str(),
        Some("no_workspace"),
        "{}",
        early
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let _ = request_ok(&mut stdin, &mut reader, "3", "settings.get", json!({}));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "settings.update",
        json!({ "retakePrefixes": ["2721", "2722"] }),
    );

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "trainingUnits.create",
        json!({ "codePrefix": "27", "name": "Trung tâm 27" }),
    );
    let unit_id = created["unitId"].as_str().expect("unitId").to_string();
    let _ = request_ok(&mut stdin, &mut reader, "6", "trainingUnits.list", json!({}));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "trainingUnits.match",
        json!({ "studentIds": ["2721034", "99001"] }),
    );

    let ingest = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "roster.ingest",
        json!({ "rows": [
            { "SBD": "7", "Họ và tên": "Nguyễn Văn A", "HẠNG GPLX": "B2",
              "studentId": "99001", "subjects": "L", "LÝ THUYẾT": "ĐẠT" }
        ]}),
    );
    let records = ingest["records"].clone();

    let saved = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "sessions.save",
        json!({
            "name": "Smoke Session",
            "reportDate": "2024-06-01",
            "records": records,
            "meta": { "location": "Hội trường A" }
        }),
    );
    let session_id = saved["sessionId"].as_str().expect("sessionId").to_string();

    let _ = request_ok(&mut stdin, &mut reader, "10", "sessions.list", json!({}));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "sessions.get",
        json!({ "sessionId": session_id }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "sessions.updateCandidate",
        json!({
            "sessionId": session_id,
            "studentId": "99001",
            "patch": { "fullName": "Nguyễn Văn A (sửa)" }
        }),
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "audit.precheck",
        json!({ "records": [] }),
    );
    let _ = request_ok(&mut stdin, &mut reader, "14", "audit.sweep", json!({}));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "15",
        "fees.compute",
        json!({ "sessionId": session_id }),
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "16",
        "reports.resultsModel",
        json!({ "sessionId": session_id }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "17",
        "reports.exportCsv",
        json!({ "sessionId": session_id, "outPath": csv_out.to_string_lossy() }),
    );
    assert!(csv_out.is_file(), "csv export should exist");

    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "18",
        "backup.exportWorkspaceBundle",
        json!({ "outPath": bundle_out.to_string_lossy() }),
    );
    assert!(exported["dbSha256"].as_str().unwrap_or("").len() == 64);

    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "19",
        "backup.importWorkspaceBundle",
        json!({ "inPath": bundle_out.to_string_lossy() }),
    );
    assert_eq!(imported["digestVerified"].as_bool(), Some(true));

    // Import drops the connection; the shell re-selects.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "20",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let listed = request_ok(&mut stdin, &mut reader, "21", "sessions.list", json!({}));
    assert_eq!(listed["sessions"].as_array().map(|a| a.len()), Some(1));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "22",
        "trainingUnits.delete",
        json!({ "unitId": unit_id }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "23",
        "sessions.delete",
        json!({ "sessionId": session_id }),
    );

    let unknown = request(&mut stdin, &mut reader, "24", "nope.nothing", json!({}));
    assert_eq!(unknown["error"]["code"].as_str(), Some("not_implemented"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
