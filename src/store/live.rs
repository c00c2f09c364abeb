//! Live table operations
//!
//! One row per entity currently believed to exist upstream. All functions take
//! a plain `&Connection` so they run unchanged inside a transaction.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::time::SqlInstant;
use crate::error::StoreError;
use crate::model::{Entity, Stored, Windowed};

fn stored_from_row<E: Entity>(row: &Row<'_>) -> rusqlite::Result<Stored<E>> {
    let touched_at: SqlInstant = row.get("touched_at")?;
    Ok(Stored {
        entity: E::from_row(row)?,
        version: row.get("version")?,
        touched_at: touched_at.0,
    })
}

fn column_list<E: Entity>() -> String {
    E::COLUMNS.iter().map(|c| c.name).collect::<Vec<_>>().join(", ")
}

fn encode<E: Entity>(entity: &E, operation: &'static str) -> Result<Vec<Value>, StoreError> {
    entity
        .field_values()
        .map_err(StoreError::sql(operation, E::KIND.table()))
}

/// Get the live row for an id
pub fn get<E: Entity>(conn: &Connection, id: i64) -> Result<Option<Stored<E>>, StoreError> {
    let table = E::KIND.table();
    let mut stmt = conn
        .prepare_cached(&format!("SELECT * FROM {} WHERE id = ?1", table))
        .map_err(StoreError::sql("select", table))?;

    stmt.query_row(params![id], stored_from_row::<E>)
        .optional()
        .map_err(StoreError::sql("select", table))
}

/// Insert a new live row
pub fn insert<E: Entity>(
    conn: &Connection,
    entity: &E,
    version: i64,
    touched_at: DateTime<Utc>,
) -> Result<(), StoreError> {
    let table = E::KIND.table();
    let placeholders = (1..=E::COLUMNS.len() + 3)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {} (id, {}, version, touched_at) VALUES ({})",
        table,
        column_list::<E>(),
        placeholders
    );

    let mut values = Vec::with_capacity(E::COLUMNS.len() + 3);
    values.push(Value::Integer(entity.id()));
    values.extend(encode(entity, "insert")?);
    values.push(Value::Integer(version));
    values.push(Value::Text(super::time::format_instant(&touched_at)));

    conn.prepare_cached(&sql)
        .and_then(|mut stmt| stmt.execute(params_from_iter(values)))
        .map_err(StoreError::sql("insert", table))?;
    Ok(())
}

/// Overwrite the business fields of an existing row
pub fn update<E: Entity>(
    conn: &Connection,
    entity: &E,
    version: i64,
    touched_at: DateTime<Utc>,
) -> Result<(), StoreError> {
    let table = E::KIND.table();
    let assignments = E::COLUMNS
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = ?{}", c.name, i + 2))
        .collect::<Vec<_>>()
        .join(", ");
    let n = E::COLUMNS.len();
    let sql = format!(
        "UPDATE {} SET {}, version = ?{}, touched_at = ?{} WHERE id = ?1",
        table,
        assignments,
        n + 2,
        n + 3
    );

    let mut values = Vec::with_capacity(n + 3);
    values.push(Value::Integer(entity.id()));
    values.extend(encode(entity, "update")?);
    values.push(Value::Integer(version));
    values.push(Value::Text(super::time::format_instant(&touched_at)));

    conn.prepare_cached(&sql)
        .and_then(|mut stmt| stmt.execute(params_from_iter(values)))
        .map_err(StoreError::sql("update", table))?;
    Ok(())
}

/// Mark a row as observed without changing anything else
pub fn touch<E: Entity>(conn: &Connection, id: i64, touched_at: DateTime<Utc>) -> Result<(), StoreError> {
    let table = E::KIND.table();
    conn.prepare_cached(&format!("UPDATE {} SET touched_at = ?2 WHERE id = ?1", table))
        .and_then(|mut stmt| stmt.execute(params![id, SqlInstant(touched_at)]))
        .map_err(StoreError::sql("touch", table))?;
    Ok(())
}

pub fn delete<E: Entity>(conn: &Connection, id: i64) -> Result<(), StoreError> {
    let table = E::KIND.table();
    conn.prepare_cached(&format!("DELETE FROM {} WHERE id = ?1", table))
        .and_then(|mut stmt| stmt.execute(params![id]))
        .map_err(StoreError::sql("delete", table))?;
    Ok(())
}

/// Rows whose `touched_at` is strictly older than `before`, optionally
/// narrowed to one parent project.
pub fn stale<E: Entity>(
    conn: &Connection,
    before: DateTime<Utc>,
    parent_id: Option<i64>,
) -> Result<Vec<Stored<E>>, StoreError> {
    let table = E::KIND.table();
    let mut sql = format!("SELECT * FROM {} WHERE touched_at < ?1", table);
    let mut values = vec![Value::Text(super::time::format_instant(&before))];

    if let (Some(column), Some(parent_id)) = (E::PARENT_COLUMN, parent_id) {
        sql.push_str(&format!(" AND {} = ?2", column));
        values.push(Value::Integer(parent_id));
    }
    sql.push_str(" ORDER BY id");

    let mut stmt = conn.prepare(&sql).map_err(StoreError::sql("select stale", table))?;
    let rows = stmt
        .query_map(params_from_iter(values), stored_from_row::<E>)
        .map_err(StoreError::sql("select stale", table))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::sql("select stale", table))
}

/// Advance `touched_at` on untouched rows dated outside `[from, to]`.
pub fn touch_outside_window<E: Windowed>(
    conn: &Connection,
    from: NaiveDate,
    to: NaiveDate,
    touched_at: DateTime<Utc>,
) -> Result<usize, StoreError> {
    let table = E::KIND.table();
    let column = E::DATE_COLUMN;
    let sql = format!(
        "UPDATE {table} SET touched_at = ?1 \
         WHERE touched_at < ?1 AND ({column} < ?2 OR {column} > ?3)"
    );
    conn.prepare_cached(&sql)
        .and_then(|mut stmt| stmt.execute(params![SqlInstant(touched_at), from, to]))
        .map_err(StoreError::sql("exempt", table))
}

/// Every live row, ordered by id
pub fn list<E: Entity>(conn: &Connection) -> Result<Vec<Stored<E>>, StoreError> {
    let table = E::KIND.table();
    let mut stmt = conn
        .prepare(&format!("SELECT * FROM {} ORDER BY id", table))
        .map_err(StoreError::sql("list", table))?;
    let rows = stmt
        .query_map([], stored_from_row::<E>)
        .map_err(StoreError::sql("list", table))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::sql("list", table))
}

pub fn count<E: Entity>(conn: &Connection) -> Result<u64, StoreError> {
    let table = E::KIND.table();
    let n: i64 = conn
        .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
        .map_err(StoreError::sql("count", table))?;
    Ok(n as u64)
}
