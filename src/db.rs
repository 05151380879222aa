use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::fees::FeeRates;
use crate::roster::default_aliases;

pub const DB_FILE: &str = "sathach.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    // Sessions are stored wholesale: one JSON payload per row holding the
    // roster, the computed aggregates, and the report metadata. The columns
    // outside payload exist only for listing and chronological ordering.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            report_date TEXT NOT NULL,
            payload TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_report_date ON sessions(report_date)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS training_units(
            id TEXT PRIMARY KEY,
            code_prefix TEXT NOT NULL,
            name TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_training_units_prefix
         ON training_units(code_prefix)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

/// Training organization reference entry. Candidates are labeled by
/// longest-prefix match of `code_prefix` against their id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingUnit {
    pub id: String,
    pub code_prefix: String,
    pub name: String,
}

/// The injectable organization configuration: header aliases for the
/// normalizer, the retake-cohort id prefixes, and the fee rate table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterConfig {
    pub aliases: BTreeMap<String, String>,
    pub retake_prefixes: Vec<String>,
    pub fee_rates: FeeRates,
}

impl Default for RosterConfig {
    fn default() -> Self {
        RosterConfig {
            aliases: default_aliases(),
            retake_prefixes: vec![
                "2721".to_string(),
                "2722".to_string(),
                "2411".to_string(),
            ],
            fee_rates: FeeRates::default(),
        }
    }
}

fn read_setting(conn: &Connection, key: &str) -> anyhow::Result<Option<String>> {
    let value = conn
        .query_row("SELECT value FROM settings WHERE key = ?", [key], |r| {
            r.get::<_, String>(0)
        })
        .optional()?;
    Ok(value)
}

pub fn write_setting(conn: &Connection, key: &str, value: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (key, value),
    )?;
    Ok(())
}

/// Load the persisted config, falling back to organization defaults for any
/// key never written. Unparseable stored values also fall back rather than
/// wedging the workspace.
pub fn load_config(conn: &Connection) -> anyhow::Result<RosterConfig> {
    let defaults = RosterConfig::default();
    let aliases = match read_setting(conn, "aliases")? {
        Some(text) => serde_json::from_str(&text).unwrap_or(defaults.aliases),
        None => defaults.aliases,
    };
    let retake_prefixes = match read_setting(conn, "retakePrefixes")? {
        Some(text) => serde_json::from_str(&text).unwrap_or(defaults.retake_prefixes),
        None => defaults.retake_prefixes,
    };
    let fee_rates = match read_setting(conn, "feeRates")? {
        Some(text) => serde_json::from_str(&text).unwrap_or(defaults.fee_rates),
        None => defaults.fee_rates,
    };
    Ok(RosterConfig {
        aliases,
        retake_prefixes,
        fee_rates,
    })
}
