use rusqlite::Connection;
use serde_json::json;

use crate::fees::{compute_fees, FeeRates};
use crate::ipc::helpers::{err, get_required_str, load_config, load_session, ok, HandlerErr};
use crate::ipc::types::{AppState, Request};

fn fees_compute(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let session_id = get_required_str(params, "sessionId")?;
    let row = load_session(conn, &session_id)?;

    let rates: FeeRates = match params.get("rates") {
        Some(raw) => serde_json::from_value(raw.clone())
            .map_err(|e| HandlerErr::new("bad_params", format!("rates: {}", e)))?,
        None => load_config(conn)?.fee_rates,
    };

    let model = compute_fees(
        &row.payload.records,
        &row.payload.app_data.grand_total,
        &rates,
    );
    Ok(json!({
        "sessionId": row.id,
        "rates": rates,
        "fees": model,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "fees.compute" => {
            let Some(conn) = state.db.as_ref() else {
                return Some(err(&req.id, "no_workspace", "select a workspace first", None));
            };
            Some(match fees_compute(conn, &req.params) {
                Ok(result) => ok(&req.id, result),
                Err(error) => error.response(&req.id),
            })
        }
        _ => None,
    }
}
