//! Append-only history tables
//!
//! A history row is the full set of versioned fields as they were at
//! `version`, written just before the live row moved past that version or was
//! removed. Rows are never updated or deleted.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::Serialize;

use super::time::{format_instant, SqlInstant};
use crate::error::StoreError;
use crate::model::Entity;

/// A prior state of one entity.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryRecord<E> {
    #[serde(flatten)]
    pub entity: E,
    pub version: i64,
    pub changed_at: DateTime<Utc>,
    /// The snapshot is the entity's final state before it was reaped.
    pub deleted: bool,
}

impl<E: Entity> HistoryRecord<E> {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let changed_at: SqlInstant = row.get("changed_at")?;
        Ok(Self {
            entity: E::from_row(row)?,
            version: row.get("version")?,
            changed_at: changed_at.0,
            deleted: row.get("deleted")?,
        })
    }
}

/// Append one snapshot
pub fn append<E: Entity>(
    conn: &Connection,
    entity: &E,
    version: i64,
    changed_at: DateTime<Utc>,
    deleted: bool,
) -> Result<(), StoreError> {
    let table = E::KIND.history_table();
    let n = E::COLUMNS.len();
    let columns = E::COLUMNS.iter().map(|c| c.name).collect::<Vec<_>>().join(", ");
    let placeholders = (1..=n + 4).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ");
    let sql = format!(
        "INSERT INTO {} (id, {}, version, changed_at, deleted) VALUES ({})",
        table, columns, placeholders
    );

    let mut values = Vec::with_capacity(n + 4);
    values.push(Value::Integer(entity.id()));
    values.extend(entity.field_values().map_err(StoreError::sql("encode", table))?);
    values.push(Value::Integer(version));
    values.push(Value::Text(format_instant(&changed_at)));
    values.push(Value::Integer(deleted as i64));

    conn.prepare_cached(&sql)
        .and_then(|mut stmt| stmt.execute(params_from_iter(values)))
        .map_err(StoreError::sql("insert", table))?;
    Ok(())
}

/// All snapshots of one entity, oldest first
pub fn for_entity<E: Entity>(conn: &Connection, id: i64) -> Result<Vec<HistoryRecord<E>>, StoreError> {
    let table = E::KIND.history_table();
    let mut stmt = conn
        .prepare_cached(&format!("SELECT * FROM {} WHERE id = ?1 ORDER BY version", table))
        .map_err(StoreError::sql("select", table))?;
    let rows = stmt
        .query_map(params![id], HistoryRecord::<E>::from_row)
        .map_err(StoreError::sql("select", table))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::sql("select", table))
}

/// Highest version ever archived for an id
pub fn last_version<E: Entity>(conn: &Connection, id: i64) -> Result<Option<i64>, StoreError> {
    let table = E::KIND.history_table();
    conn.prepare_cached(&format!("SELECT MAX(version) FROM {} WHERE id = ?1", table))
        .and_then(|mut stmt| stmt.query_row(params![id], |row| row.get(0)))
        .map_err(StoreError::sql("select", table))
}

pub fn count<E: Entity>(conn: &Connection) -> Result<u64, StoreError> {
    let table = E::KIND.history_table();
    let n: i64 = conn
        .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
        .map_err(StoreError::sql("count", table))?;
    Ok(n as u64)
}
