use rusqlite::Connection;
use serde_json::json;
use std::collections::BTreeMap;

use crate::aggregate::aggregate;
use crate::ipc::helpers::{err, load_config, ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::roster::normalize_rows;

/// Normalize + classify + aggregate an uploaded roster. Pure preview:
/// nothing is persisted until sessions.save.
fn roster_ingest(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let Some(rows) = params.get("rows").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::new("bad_params", "missing rows"));
    };

    let config = load_config(conn)?;
    // A per-request alias map extends the stored one; request entries win.
    let mut aliases = config.aliases;
    if let Some(raw) = params.get("aliases") {
        let overrides: BTreeMap<String, String> = serde_json::from_value(raw.clone())
            .map_err(|e| HandlerErr::new("bad_params", format!("aliases: {}", e)))?;
        aliases.extend(overrides);
    }

    let records = normalize_rows(rows, &aliases);
    let app_data = aggregate(&records, &config.retake_prefixes);

    Ok(json!({
        "records": records,
        "appData": app_data,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "roster.ingest" => {
            let Some(conn) = state.db.as_ref() else {
                return Some(err(&req.id, "no_workspace", "select a workspace first", None));
            };
            Some(match roster_ingest(conn, &req.params) {
                Ok(result) => ok(&req.id, result),
                Err(error) => error.response(&req.id),
            })
        }
        _ => None,
    }
}
