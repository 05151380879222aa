use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

use crate::ipc::helpers::{err, get_required_str, list_units, ok, HandlerErr};
use crate::ipc::types::{AppState, Request};

fn units_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let units = list_units(conn)?;
    Ok(json!({ "units": units }))
}

fn units_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let code_prefix = get_required_str(params, "codePrefix")?.trim().to_string();
    let name = get_required_str(params, "name")?.trim().to_string();
    if code_prefix.is_empty() {
        return Err(HandlerErr::new("bad_params", "codePrefix must not be blank"));
    }
    if name.is_empty() {
        return Err(HandlerErr::new("bad_params", "name must not be blank"));
    }

    let unit_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO training_units(id, code_prefix, name) VALUES(?, ?, ?)",
        (&unit_id, &code_prefix, &name),
    )
    .map_err(|e| HandlerErr {
        code: "db_insert_failed",
        message: e.to_string(),
        details: Some(json!({ "codePrefix": code_prefix })),
    })?;
    Ok(json!({ "unitId": unit_id }))
}

fn units_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let unit_id = get_required_str(params, "unitId")?;
    let deleted = conn
        .execute("DELETE FROM training_units WHERE id = ?", [&unit_id])
        .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    if deleted == 0 {
        return Err(HandlerErr::new("not_found", "training unit not found"));
    }
    Ok(json!({ "deleted": true }))
}

/// Label candidate ids with their training unit. Longest prefix wins; ids
/// matching no unit come back with null.
fn units_match(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let Some(ids) = params.get("studentIds").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::new("bad_params", "missing studentIds"));
    };
    let units = list_units(conn)?;

    let matches: Vec<serde_json::Value> = ids
        .iter()
        .filter_map(|v| v.as_str())
        .map(|id| {
            let best = units
                .iter()
                .filter(|u| id.starts_with(u.code_prefix.as_str()))
                .max_by_key(|u| u.code_prefix.len());
            match best {
                Some(u) => json!({
                    "studentId": id,
                    "unitId": u.id,
                    "unitName": u.name,
                }),
                None => json!({
                    "studentId": id,
                    "unitId": null,
                    "unitName": null,
                }),
            }
        })
        .collect();
    Ok(json!({ "matches": matches }))
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
        "trainingUnits.list" => Some(with_db(state, req, |conn, _| units_list(conn))),
        "trainingUnits.create" => Some(with_db(state, req, units_create)),
        "trainingUnits.delete" => Some(with_db(state, req, units_delete)),
        "trainingUnits.match" => Some(with_db(state, req, units_match)),
        _ => None,
    }
}
