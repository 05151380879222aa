use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::aggregate::AppData;
use crate::db::{self, RosterConfig, TrainingUnit};
use crate::roster::CandidateRecord;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({ "id": id, "ok": true, "result": result })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({ "code": code, "message": message.into() });
    if let Some(details) = details {
        error["details"] = details;
    }
    json!({ "id": id, "ok": false, "error": error })
}

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> HandlerErr {
        HandlerErr {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

/// Everything a session row persists: the roster, the derived cohort tables,
/// the free-text report metadata, and the training-unit list as of save time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    #[serde(default)]
    pub records: Vec<CandidateRecord>,
    #[serde(default)]
    pub app_data: AppData,
    #[serde(default)]
    pub meta: serde_json::Value,
    #[serde(default)]
    pub training_units: Vec<TrainingUnit>,
}

#[derive(Debug, Clone)]
pub struct SessionRow {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub report_date: String,
    pub payload: SessionPayload,
}

fn parse_payload(text: &str) -> Result<SessionPayload, HandlerErr> {
    serde_json::from_str(text).map_err(|e| {
        HandlerErr::new("payload_corrupt", format!("stored session payload: {}", e))
    })
}

pub fn load_session(conn: &Connection, session_id: &str) -> Result<SessionRow, HandlerErr> {
    let row: Option<(String, String, String, String)> = conn
        .query_row(
            "SELECT name, created_at, report_date, payload FROM sessions WHERE id = ?",
            [session_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )
        .optional()
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    let Some((name, created_at, report_date, payload_text)) = row else {
        return Err(HandlerErr {
            code: "not_found",
            message: "session not found".to_string(),
            details: Some(json!({ "sessionId": session_id })),
        });
    };
    Ok(SessionRow {
        id: session_id.to_string(),
        name,
        created_at,
        report_date,
        payload: parse_payload(&payload_text)?,
    })
}

/// All saved sessions, oldest report first. Report dates are stored as
/// YYYY-MM-DD so the text ordering is chronological; created_at breaks ties.
pub fn load_history(conn: &Connection) -> Result<Vec<SessionRow>, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT id, name, created_at, report_date, payload
             FROM sessions
             ORDER BY report_date, created_at",
        )
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    let raw_rows = stmt
        .query_map([], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, String>(4)?,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;

    let mut rows = Vec::with_capacity(raw_rows.len());
    for (id, name, created_at, report_date, payload_text) in raw_rows {
        rows.push(SessionRow {
            id,
            name,
            created_at,
            report_date,
            payload: parse_payload(&payload_text)?,
        });
    }
    Ok(rows)
}

pub fn load_config(conn: &Connection) -> Result<RosterConfig, HandlerErr> {
    db::load_config(conn).map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))
}

pub fn list_units(conn: &Connection) -> Result<Vec<TrainingUnit>, HandlerErr> {
    let mut stmt = conn
        .prepare("SELECT id, code_prefix, name FROM training_units ORDER BY code_prefix")
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    stmt.query_map([], |r| {
        Ok(TrainingUnit {
            id: r.get(0)?,
            code_prefix: r.get(1)?,
            name: r.get(2)?,
        })
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))
}

pub fn parse_records(params: &serde_json::Value) -> Result<Vec<CandidateRecord>, HandlerErr> {
    let Some(raw) = params.get("records") else {
        return Err(HandlerErr::new("bad_params", "missing records"));
    };
    if !raw.is_array() {
        return Err(HandlerErr::new("bad_params", "records must be an array"));
    }
    serde_json::from_value(raw.clone())
        .map_err(|e| HandlerErr::new("bad_params", format!("records: {}", e)))
}
