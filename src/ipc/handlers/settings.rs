use rusqlite::Connection;
use serde_json::json;
use std::collections::BTreeMap;

use crate::db::write_setting;
use crate::fees::FeeRates;
use crate::ipc::helpers::{err, load_config, ok, HandlerErr};
use crate::ipc::types::{AppState, Request};

fn settings_get(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let config = load_config(conn)?;
    Ok(json!(config))
}

/// Partial patch: only the keys present in params are validated and
/// persisted; everything else keeps its stored (or default) value.
fn settings_update(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    if let Some(raw) = params.get("aliases") {
        let aliases: BTreeMap<String, String> = serde_json::from_value(raw.clone())
            .map_err(|e| HandlerErr::new("bad_params", format!("aliases: {}", e)))?;
        let text = serde_json::to_string(&aliases)
            .map_err(|e| HandlerErr::new("encode_failed", e.to_string()))?;
        write_setting(conn, "aliases", &text)
            .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    }
    if let Some(raw) = params.get("retakePrefixes") {
        let prefixes: Vec<String> = serde_json::from_value(raw.clone())
            .map_err(|e| HandlerErr::new("bad_params", format!("retakePrefixes: {}", e)))?;
        let text = serde_json::to_string(&prefixes)
            .map_err(|e| HandlerErr::new("encode_failed", e.to_string()))?;
        write_setting(conn, "retakePrefixes", &text)
            .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    }
    if let Some(raw) = params.get("feeRates") {
        let rates: FeeRates = serde_json::from_value(raw.clone())
            .map_err(|e| HandlerErr::new("bad_params", format!("feeRates: {}", e)))?;
        let text = serde_json::to_string(&rates)
            .map_err(|e| HandlerErr::new("encode_failed", e.to_string()))?;
        write_setting(conn, "feeRates", &text)
            .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    }
    let config = load_config(conn)?;
    Ok(json!(config))
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
        "settings.get" => Some(with_db(state, req, |conn, _| settings_get(conn))),
        "settings.update" => Some(with_db(state, req, settings_update)),
        _ => None,
    }
}
