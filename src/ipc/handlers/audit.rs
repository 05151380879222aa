use rusqlite::Connection;
use serde_json::json;

use crate::audit::{audit_batch, HistorySession};
use crate::ipc::helpers::{err, load_history, ok, parse_records, HandlerErr, SessionRow};
use crate::ipc::types::{AppState, Request};

fn to_history(rows: &[SessionRow]) -> Vec<HistorySession> {
    rows.iter()
        .map(|row| HistorySession {
            name: row.name.clone(),
            report_date: row.report_date.clone(),
            records: row.payload.records.clone(),
        })
        .collect()
}

/// Audit an unsaved batch against the full saved history. Requiring an open
/// workspace here is deliberate: "could not check" must surface as an error,
/// never be conflated with "no findings".
fn audit_precheck(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let records = parse_records(params)?;
    let history = to_history(&load_history(conn)?);
    let findings = audit_batch(&records, &history);
    Ok(json!({
        "sessionsChecked": history.len(),
        "findings": findings,
    }))
}

/// Standalone sweep: every saved session audited against everything
/// strictly before it, to surface inconsistencies already committed.
fn audit_sweep(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let rows = load_history(conn)?;
    let history = to_history(&rows);
    let mut flagged: Vec<serde_json::Value> = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        let findings = audit_batch(&row.payload.records, &history[..i]);
        if findings.is_empty() {
            continue;
        }
        flagged.push(json!({
            "sessionId": row.id,
            "sessionName": row.name,
            "reportDate": row.report_date,
            "findings": findings,
        }));
    }
    Ok(json!({
        "sessionsChecked": rows.len(),
        "sessions": flagged,
    }))
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
        "audit.precheck" => Some(with_db(state, req, audit_precheck)),
        "audit.sweep" => Some(with_db(state, req, |conn, _| audit_sweep(conn))),
        _ => None,
    }
}
