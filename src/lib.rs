//! harvest-sync - Harvest account mirror with change history
//!
//! Periodically pulls every entity of a Harvest time-tracking account
//! (users, clients, projects, tasks, task assignments, expenses, invoices and
//! time entries) into a local SQLite database, keeping:
//! - one live row per entity currently upstream
//! - an append-only history of every prior state, including removals
//! - a log of committed runs
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            SyncCoordinator              │
//! │   (one run = one write transaction)     │
//! └────────────────┬────────────────────────┘
//!                  │
//!      ┌───────────┴───────────┐
//!      ▼                       ▼
//! ┌─────────────┐       ┌─────────────┐
//! │HarvestSource│       │ reconcile / │
//! │ (HTTP/Mock) │       │ reap        │
//! └─────────────┘       └──────┬──────┘
//!                              ▼
//!                       ┌─────────────┐
//!                       │   Store     │
//!                       │ (live +     │
//!                       │  history)   │
//!                       └─────────────┘
//! ```

pub mod config;
pub mod error;
pub mod model;
pub mod source;
pub mod store;
pub mod sync;

// Re-export main types for convenience
pub use config::{Config, Credentials};
pub use error::{Scope, SourceError, StoreError, SyncError};
pub use model::{Entity, EntityKind, Record, Stored};
pub use source::{HarvestClient, HarvestSource, MockSource, Modules};
pub use store::Store;
pub use sync::{DateWindow, RunResult, SyncCoordinator};
