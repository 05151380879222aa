use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

use crate::aggregate::aggregate;
use crate::ipc::helpers::{
    err, get_required_str, list_units, load_config, load_history, load_session, ok,
    parse_records, HandlerErr, SessionPayload,
};
use crate::ipc::types::{AppState, Request};

fn validate_report_date(raw: &str) -> Result<String, HandlerErr> {
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| HandlerErr::new("bad_params", "reportDate must be YYYY-MM-DD"))?;
    Ok(date.format("%Y-%m-%d").to_string())
}

/// Upsert one session wholesale. Aggregates are recomputed from the records
/// on every save; the store is last-write-wins by design.
fn sessions_save(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    let report_date = validate_report_date(&get_required_str(params, "reportDate")?)?;
    let records = parse_records(params)?;
    let meta = params.get("meta").cloned().unwrap_or(serde_json::Value::Null);

    let config = load_config(conn)?;
    let app_data = aggregate(&records, &config.retake_prefixes);
    let training_units = list_units(conn)?;

    let session_id = params
        .get("sessionId")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let record_count = records.len();

    let payload = SessionPayload {
        records,
        app_data,
        meta,
        training_units,
    };
    let payload_text = serde_json::to_string(&payload)
        .map_err(|e| HandlerErr::new("encode_failed", e.to_string()))?;
    let created_at = Utc::now().to_rfc3339();

    // Re-save with the same id overwrites everything except created_at.
    conn.execute(
        "INSERT INTO sessions(id, name, created_at, report_date, payload)
         VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           report_date = excluded.report_date,
           payload = excluded.payload",
        (&session_id, &name, &created_at, &report_date, &payload_text),
    )
    .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;

    Ok(json!({
        "sessionId": session_id,
        "recordCount": record_count,
        "grandTotal": payload.app_data.grand_total,
    }))
}

fn sessions_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let rows = load_history(conn)?;
    let sessions: Vec<serde_json::Value> = rows
        .iter()
        .map(|row| {
            json!({
                "sessionId": row.id,
                "name": row.name,
                "createdAt": row.created_at,
                "reportDate": row.report_date,
                "recordCount": row.payload.records.len(),
            })
        })
        .collect();
    Ok(json!({ "sessions": sessions }))
}

fn sessions_get(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let session_id = get_required_str(params, "sessionId")?;
    let row = load_session(conn, &session_id)?;
    Ok(json!({
        "sessionId": row.id,
        "name": row.name,
        "createdAt": row.created_at,
        "reportDate": row.report_date,
        "records": row.payload.records,
        "appData": row.payload.app_data,
        "meta": row.payload.meta,
        "trainingUnits": row.payload.training_units,
    }))
}

fn sessions_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let session_id = get_required_str(params, "sessionId")?;
    let deleted = conn
        .execute("DELETE FROM sessions WHERE id = ?", [&session_id])
        .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    if deleted == 0 {
        return Err(HandlerErr::new("not_found", "session not found"));
    }
    Ok(json!({ "deleted": true }))
}

/// Patch a saved candidate's name/national-id in place. Deliberately does
/// not re-run aggregation: identity corrections never change the counts.
fn sessions_update_candidate(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let session_id = get_required_str(params, "sessionId")?;
    let student_id = get_required_str(params, "studentId")?;
    let Some(patch) = params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::new("bad_params", "missing patch"));
    };

    let mut row = load_session(conn, &session_id)?;
    let Some(rec) = row
        .payload
        .records
        .iter_mut()
        .find(|r| r.student_id == student_id)
    else {
        return Err(HandlerErr::new("not_found", "candidate not found in session"));
    };

    if let Some(v) = patch.get("fullName").and_then(|v| v.as_str()) {
        rec.full_name = v.to_string();
    }
    if let Some(v) = patch.get("nationalId").and_then(|v| v.as_str()) {
        rec.national_id = v.to_string();
    }

    let payload_text = serde_json::to_string(&row.payload)
        .map_err(|e| HandlerErr::new("encode_failed", e.to_string()))?;
    conn.execute(
        "UPDATE sessions SET payload = ? WHERE id = ?",
        (&payload_text, &session_id),
    )
    .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;

    Ok(json!({ "updated": true }))
}

fn with_db(
    state: &mut AppState,
    req: &Request,
    f: impl FnOnce(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sessions.save" => Some(with_db(state, req, sessions_save)),
        "sessions.list" => Some(with_db(state, req, |conn, _| sessions_list(conn))),
        "sessions.get" => Some(with_db(state, req, sessions_get)),
        "sessions.delete" => Some(with_db(state, req, sessions_delete)),
        "sessions.updateCandidate" => Some(with_db(state, req, sessions_update_candidate)),
        _ => None,
    }
}
