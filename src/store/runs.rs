//! Committed run log

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::time::SqlInstant;
use crate::error::StoreError;

const TABLE: &str = "sync_runs";

/// One committed sync run.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub window_from: NaiveDate,
    pub window_to: NaiveDate,
    pub finished_at: DateTime<Utc>,
    /// Per-type counts as JSON.
    pub counts_json: String,
}

impl RunRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let started_at: SqlInstant = row.get("started_at")?;
        let finished_at: SqlInstant = row.get("finished_at")?;
        Ok(Self {
            run_id: row.get("run_id")?,
            started_at: started_at.0,
            window_from: row.get("window_from")?,
            window_to: row.get("window_to")?,
            finished_at: finished_at.0,
            counts_json: row.get("counts_json")?,
        })
    }
}

pub fn record(conn: &Connection, run: &RunRecord) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO sync_runs (run_id, started_at, window_from, window_to, finished_at, counts_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            run.run_id,
            SqlInstant(run.started_at),
            run.window_from,
            run.window_to,
            SqlInstant(run.finished_at),
            run.counts_json,
        ],
    )
    .map_err(StoreError::sql("insert", TABLE))?;
    Ok(())
}

/// Reference instant of the most recent committed run
pub fn last_started_at(conn: &Connection) -> Result<Option<DateTime<Utc>>, StoreError> {
    let latest: Option<SqlInstant> = conn
        .query_row(
            "SELECT started_at FROM sync_runs ORDER BY started_at DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(StoreError::sql("select", TABLE))?;
    Ok(latest.map(|instant| instant.0))
}

/// All committed runs, oldest first
pub fn list(conn: &Connection) -> Result<Vec<RunRecord>, StoreError> {
    let mut stmt = conn
        .prepare("SELECT * FROM sync_runs ORDER BY started_at")
        .map_err(StoreError::sql("list", TABLE))?;
    let rows = stmt
        .query_map([], RunRecord::from_row)
        .map_err(StoreError::sql("list", TABLE))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::sql("list", TABLE))
}
