//! Run outcome reporting

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::reconcile::MergeCounts;
use crate::error::Scope;
use crate::model::EntityKind;

/// Steps of a run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Start,
    FetchParents,
    UpsertParents,
    FetchChildren,
    UpsertChildren,
    ReapAll,
    Commit,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Start => "start",
            RunPhase::FetchParents => "fetch_parents",
            RunPhase::UpsertParents => "upsert_parents",
            RunPhase::FetchChildren => "fetch_children",
            RunPhase::UpsertChildren => "upsert_children",
            RunPhase::ReapAll => "reap_all",
            RunPhase::Commit => "commit",
        };
        f.write_str(name)
    }
}

/// Per-kind counts of one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TypeCounts {
    pub inserted: u64,
    pub changed: u64,
    pub unchanged: u64,
    pub removed: u64,
}

impl TypeCounts {
    /// Rows written with new field values (inserts and changes).
    pub fn merged(&self) -> u64 {
        self.inserted + self.changed
    }

    pub(crate) fn absorb(&mut self, merge: &MergeCounts) {
        self.inserted += merge.inserted;
        self.changed += merge.changed;
        self.unchanged += merge.unchanged;
    }
}

/// Where and why a run stopped.
#[derive(Debug, Clone, Serialize)]
pub struct RunFailure {
    pub phase: RunPhase,
    pub kind: Option<EntityKind>,
    pub scope: Option<Scope>,
    pub message: String,
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed during {}", self.phase)?;
        if let Some(kind) = self.kind {
            write!(f, " ({}", kind)?;
            if let Some(scope) = self.scope {
                write!(f, ", {}", scope)?;
            }
            write!(f, ")")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Outcome of one run.
///
/// For a rolled-back run `counts` holds what had been staged before the
/// failure. Nothing of it is durable.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub committed: bool,
    pub counts: BTreeMap<EntityKind, TypeCounts>,
    pub failure: Option<RunFailure>,
}

impl RunResult {
    pub fn counts_for(&self, kind: EntityKind) -> TypeCounts {
        self.counts.get(&kind).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_display_names_phase_and_scope() {
        let failure = RunFailure {
            phase: RunPhase::FetchChildren,
            kind: Some(EntityKind::DayEntry),
            scope: Some(Scope::Project(42)),
            message: "HTTP 503".into(),
        };
        assert_eq!(
            failure.to_string(),
            "failed during fetch_children (day_entry, project 42): HTTP 503"
        );
    }

    #[test]
    fn test_merged_counts_inserts_and_changes() {
        let mut counts = TypeCounts::default();
        counts.absorb(&MergeCounts {
            inserted: 2,
            changed: 1,
            unchanged: 4,
        });
        assert_eq!(counts.merged(), 3);
        assert_eq!(counts.unchanged, 4);
    }
}
