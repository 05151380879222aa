use serde_json::json;
use std::path::PathBuf;

use crate::backup;
use crate::ipc::helpers::{err, get_required_str, ok, HandlerErr};
use crate::ipc::types::{AppState, Request};

fn workspace_path(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<PathBuf, HandlerErr> {
    if let Some(p) = params.get("workspacePath").and_then(|v| v.as_str()) {
        return Ok(PathBuf::from(p));
    }
    state
        .workspace
        .clone()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

fn export_bundle(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let workspace = workspace_path(state, params)?;
    let out_path = PathBuf::from(get_required_str(params, "outPath")?);
    let summary = backup::export_workspace_bundle(&workspace, &out_path)
        .map_err(|e| HandlerErr::new("backup_export_failed", e.to_string()))?;
    Ok(json!({
        "bundleFormat": summary.bundle_format,
        "dbSha256": summary.db_sha256,
        "outPath": out_path.to_string_lossy(),
    }))
}

fn import_bundle(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let workspace = workspace_path(state, params)?;
    let in_path = PathBuf::from(get_required_str(params, "inPath")?);
    let summary = backup::import_workspace_bundle(&in_path, &workspace)
        .map_err(|e| HandlerErr::new("backup_import_failed", e.to_string()))?;
    Ok(json!({
        "bundleFormatDetected": summary.bundle_format_detected,
        "digestVerified": summary.digest_verified,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "backup.exportWorkspaceBundle" => export_bundle(state, &req.params),
        "backup.importWorkspaceBundle" => {
            // The open connection may point at the database being replaced;
            // drop it so the swap is safe, then let the shell re-select.
            let r = import_bundle(state, &req.params);
            if r.is_ok() {
                state.db = None;
            }
            r
        }
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
