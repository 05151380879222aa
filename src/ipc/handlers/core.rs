use serde_json::json;
use std::path::PathBuf;

use crate::db;
use crate::ipc::helpers::{err, ok};
use crate::ipc::types::{AppState, Request};

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = path else {
        return err(&req.id, "bad_params", "missing path", None);
    };

    match db::open_db(&path) {
        Ok(conn) => {
            state.workspace = Some(path.clone());
            state.db = Some(conn);
            ok(&req.id, json!({ "path": path.to_string_lossy() }))
        }
        Err(e) => err(
            &req.id,
            "workspace_open_failed",
            e.to_string(),
            Some(json!({ "path": path.to_string_lossy() })),
        ),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(ok(
            &req.id,
            json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }),
        )),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
