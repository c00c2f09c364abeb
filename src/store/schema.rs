//! Database schema definitions
//!
//! Live and history tables are generated from each entity's declared columns,
//! so the two can never drift apart.

use rusqlite::Connection;
use tracing::info;

use crate::error::StoreError;
use crate::model::{Client, DayEntry, Entity, Expense, Invoice, Project, Task, TaskAssignment, User};

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        conn.execute_batch(&ddl())
            .map_err(|e| StoreError::Schema(format!("Failed to create tables: {}", e)))?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version > SCHEMA_VERSION {
        return Err(StoreError::Schema(format!(
            "Database schema v{} is newer than supported v{}",
            current_version, SCHEMA_VERSION
        )));
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &Connection) -> Result<i32, StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )
    .map_err(|e| StoreError::Schema(format!("Failed to create schema_version table: {}", e)))?;

    let version: Option<i32> = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
        .map_err(|e| StoreError::Schema(format!("Failed to read schema_version: {}", e)))?;

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), StoreError> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| StoreError::Schema(format!("Failed to clear schema_version: {}", e)))?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
        .map_err(|e| StoreError::Schema(format!("Failed to set schema_version: {}", e)))?;
    Ok(())
}

/// Full DDL for every table, in dependency order.
pub fn ddl() -> String {
    let mut sql = String::new();
    sql.push_str(&entity_ddl::<User>());
    sql.push_str(&entity_ddl::<Client>());
    sql.push_str(&entity_ddl::<Task>());
    sql.push_str(&entity_ddl::<Invoice>());
    sql.push_str(&entity_ddl::<Project>());
    sql.push_str(&entity_ddl::<TaskAssignment>());
    sql.push_str(&entity_ddl::<Expense>());
    sql.push_str(&entity_ddl::<DayEntry>());
    sql.push_str(RUNS_SCHEMA);
    sql
}

/// Live table, its history table and their indexes.
fn entity_ddl<E: Entity>() -> String {
    let table = E::KIND.table();
    let history = E::KIND.history_table();
    let columns: String = E::COLUMNS
        .iter()
        .map(|c| format!("    {} {},\n", c.name, c.sql_type))
        .collect();

    let mut sql = format!(
        "CREATE TABLE IF NOT EXISTS {table} (\n    \
             id INTEGER PRIMARY KEY NOT NULL,\n\
         {columns}    \
             version INTEGER NOT NULL DEFAULT 1,\n    \
             touched_at TEXT NOT NULL\n\
         );\n\
         CREATE INDEX IF NOT EXISTS idx_{table}_touched_at ON {table}(touched_at);\n"
    );

    if let Some(parent) = E::PARENT_COLUMN {
        sql.push_str(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_{parent} ON {table}({parent});\n"
        ));
    }

    // `id` points at the live table but is not a declared foreign key:
    // history rows must outlive the row they describe.
    sql.push_str(&format!(
        "CREATE TABLE IF NOT EXISTS {history} (\n    \
             id INTEGER NOT NULL,\n\
         {columns}    \
             version INTEGER NOT NULL,\n    \
             changed_at TEXT NOT NULL,\n    \
             deleted INTEGER NOT NULL DEFAULT 0,\n    \
             PRIMARY KEY (id, version)\n\
         );\n\n"
    ));

    sql
}

const RUNS_SCHEMA: &str = r#"CREATE TABLE IF NOT EXISTS sync_runs (
    run_id TEXT PRIMARY KEY NOT NULL,
    started_at TEXT NOT NULL,
    window_from TEXT NOT NULL,
    window_to TEXT NOT NULL,
    finished_at TEXT NOT NULL,
    counts_json TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sync_runs_started_at ON sync_runs(started_at);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_ddl_shape() {
        let sql = entity_ddl::<TaskAssignment>();
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS task_assignments ("));
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS task_assignments_history ("));
        assert!(sql.contains("PRIMARY KEY (id, version)"));
        assert!(sql.contains("idx_task_assignments_project_id"));
        assert!(!sql.contains("REFERENCES"));
    }

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name LIKE '%_history'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 8);
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }
}
