//! SQLite store for mirrored entities
//!
//! ## Tables
//!
//! - `<kind>` (e.g. `projects`) - current rows, primary key `id`, plus
//!   `version` and `touched_at`
//! - `<kind>_history` - prior states keyed by `(id, version)`, append-only
//! - `sync_runs` - one row per committed run
//!
//! Row-level functions live in [`live`], [`history`] and [`runs`] and take a
//! `&Connection`, so the run coordinator can call them on its open
//! transaction.

pub mod history;
pub mod live;
pub mod runs;
pub mod schema;
pub mod time;

use std::path::Path;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::model::{Entity, Stored};

pub use history::HistoryRecord;
pub use runs::RunRecord;

/// Local mirror database
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create the mirror database
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        info!(path = %path.display(), "Opening SQLite database");

        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.display().to_string(),
            source,
        })?;

        // WAL keeps readers unblocked while a run holds the write transaction
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| StoreError::Schema(format!("Failed to set PRAGMA: {}", e)))?;

        schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: ":memory:".to_string(),
            source,
        })?;

        schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Read-only access outside a run
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Begin the single write transaction of a run.
    ///
    /// Dropping the returned transaction without committing rolls it back.
    pub fn begin(&mut self) -> Result<Transaction<'_>, StoreError> {
        self.conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::sql("begin", "database"))
    }

    /// DDL for every table
    pub fn schema_ddl() -> String {
        schema::ddl()
    }

    pub fn get<E: Entity>(&self, id: i64) -> Result<Option<Stored<E>>, StoreError> {
        live::get(&self.conn, id)
    }

    pub fn list<E: Entity>(&self) -> Result<Vec<Stored<E>>, StoreError> {
        live::list(&self.conn)
    }

    pub fn count<E: Entity>(&self) -> Result<u64, StoreError> {
        live::count::<E>(&self.conn)
    }

    pub fn history<E: Entity>(&self, id: i64) -> Result<Vec<HistoryRecord<E>>, StoreError> {
        history::for_entity(&self.conn, id)
    }

    pub fn history_count<E: Entity>(&self) -> Result<u64, StoreError> {
        history::count::<E>(&self.conn)
    }

    pub fn runs(&self) -> Result<Vec<RunRecord>, StoreError> {
        runs::list(&self.conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Project;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    #[test]
    fn test_open_file_database_twice() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("harvest.db");

        {
            let store = Store::open(&path).unwrap();
            assert_eq!(store.count::<Project>().unwrap(), 0);
        }
        let store = Store::open(&path).unwrap();
        let mode: String = store
            .connection()
            .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn test_dropped_transaction_rolls_back() {
        let mut store = Store::open_in_memory().unwrap();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        {
            let tx = store.begin().unwrap();
            live::insert(&tx, &Project::new(1, 10, "Internal"), 1, at).unwrap();
            assert!(live::get::<Project>(&tx, 1).unwrap().is_some());
        }

        assert!(store.get::<Project>(1).unwrap().is_none());
    }

    #[test]
    fn test_live_row_round_trip() {
        let mut store = Store::open_in_memory().unwrap();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut project = Project::new(1, 10, "Internal");
        project.budget = Some(120.5);
        project.starts_on = chrono::NaiveDate::from_ymd_opt(2024, 1, 1);
        project.created_at = Some(Utc.with_ymd_and_hms(2023, 4, 30, 20, 28, 12).unwrap());

        let tx = store.begin().unwrap();
        live::insert(&tx, &project, 1, at).unwrap();
        tx.commit().unwrap();

        let stored = store.get::<Project>(1).unwrap().unwrap();
        assert_eq!(stored.entity, project);
        assert_eq!(stored.version, 1);
        assert_eq!(stored.touched_at, at);
    }
}
