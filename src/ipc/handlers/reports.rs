use rusqlite::Connection;
use serde_json::json;
use std::path::PathBuf;

use crate::aggregate::ClassAggregate;
use crate::ipc::helpers::{err, get_required_str, load_session, ok, HandlerErr};
use crate::ipc::types::{AppState, Request};

/// The plain structured model the external renderers (screen preview,
/// print document, spreadsheet export) consume.
fn results_model(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let session_id = get_required_str(params, "sessionId")?;
    let row = load_session(conn, &session_id)?;
    Ok(json!({
        "session": {
            "sessionId": row.id,
            "name": row.name,
            "createdAt": row.created_at,
            "reportDate": row.report_date,
        },
        "firstTime": row.payload.app_data.first_time,
        "retake": row.payload.app_data.retake,
        "grandTotal": row.payload.app_data.grand_total,
        "meta": row.payload.meta,
        "trainingUnits": row.payload.training_units,
    }))
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn csv_row(cohort: &str, agg: &ClassAggregate) -> String {
    let cells = [
        cohort.to_string(),
        csv_escape(&agg.license_class),
        agg.applications.to_string(),
        agg.participants.to_string(),
        agg.subjects.theory.total.to_string(),
        agg.subjects.theory.pass.to_string(),
        agg.subjects.theory.fail.to_string(),
        agg.subjects.simulation.total.to_string(),
        agg.subjects.simulation.pass.to_string(),
        agg.subjects.simulation.fail.to_string(),
        agg.subjects.practical_course.total.to_string(),
        agg.subjects.practical_course.pass.to_string(),
        agg.subjects.practical_course.fail.to_string(),
        agg.subjects.on_road.total.to_string(),
        agg.subjects.on_road.pass.to_string(),
        agg.subjects.on_road.fail.to_string(),
        agg.final_pass.to_string(),
    ];
    cells.join(",")
}

const CSV_HEADER: &str = "cohort,licenseClass,applications,participants,\
theoryTotal,theoryPass,theoryFail,\
simulationTotal,simulationPass,simulationFail,\
practicalTotal,practicalPass,practicalFail,\
roadTotal,roadPass,roadFail,finalPass";

fn export_csv(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let session_id = get_required_str(params, "sessionId")?;
    let out_path = PathBuf::from(get_required_str(params, "outPath")?);
    let row = load_session(conn, &session_id)?;

    let mut lines = vec![CSV_HEADER.to_string()];
    for agg in &row.payload.app_data.first_time {
        lines.push(csv_row("firstTime", agg));
    }
    for agg in &row.payload.app_data.retake {
        lines.push(csv_row("retake", agg));
    }
    lines.push(csv_row("total", &row.payload.app_data.grand_total));
    let body = lines.join("\n") + "\n";

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| HandlerErr::new("io_failed", e.to_string()))?;
    }
    std::fs::write(&out_path, body).map_err(|e| HandlerErr {
        code: "io_failed",
        message: e.to_string(),
        details: Some(json!({ "outPath": out_path.to_string_lossy() })),
    })?;

    Ok(json!({
        "path": out_path.to_string_lossy(),
        "rows": lines.len() - 1,
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
        "reports.resultsModel" => Some(with_db(state, req, results_model)),
        "reports.exportCsv" => Some(with_db(state, req, export_csv)),
        _ => None,
    }
}
