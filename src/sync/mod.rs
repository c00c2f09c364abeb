//! Reconciliation and versioning engine
//!
//! - [`detect`] - field-level change detection
//! - [`reconcile`] - upsert of one fetched batch
//! - [`reap`] - removal of entities no longer upstream
//! - [`coordinator`] - phase ordering and the run transaction

pub mod context;
pub mod coordinator;
pub mod detect;
pub mod reap;
pub mod reconcile;
pub mod report;

pub use context::{DateWindow, RunContext};
pub use coordinator::SyncCoordinator;
pub use detect::{changed_fields, has_changed};
pub use reconcile::MergeCounts;
pub use report::{RunFailure, RunPhase, RunResult, TypeCounts};
