//! Upsert of one fetched batch into its live table
//!
//! For every incoming entity:
//! - no live row: insert at version 1, or one past the last archived version
//!   when the id was reaped before
//! - live row with equal fields: touch only
//! - live row with different fields: archive the live state, then overwrite
//!   and bump the version
//!
//! Every touched row gets the run's reference instant, which is what the
//! reaper later compares against.

use std::collections::HashSet;

use rusqlite::Connection;
use tracing::{debug, info_span, trace};

use super::context::RunContext;
use super::detect::changed_fields;
use crate::error::SyncError;
use crate::model::{Entity, Record, Stored};
use crate::store::{history, live};

/// Outcome counts of one upsert batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeCounts {
    pub inserted: u64,
    pub changed: u64,
    pub unchanged: u64,
}

/// Narrow decoded records to one entity type.
pub fn narrow<E: Entity>(records: Vec<Record>) -> Result<Vec<E>, SyncError> {
    records
        .into_iter()
        .map(|record| {
            E::from_record(record).map_err(|other| {
                SyncError::integrity(
                    E::KIND,
                    format!("received {} {} in a {} listing", other.kind(), other.id(), E::KIND),
                )
            })
        })
        .collect()
}

fn check_batch<E: Entity>(incoming: &[E]) -> Result<(), SyncError> {
    let mut seen = HashSet::with_capacity(incoming.len());
    for entity in incoming {
        let id = entity.id();
        if id <= 0 {
            return Err(SyncError::integrity(E::KIND, format!("invalid id {}", id)));
        }
        if !seen.insert(id) {
            return Err(SyncError::integrity(E::KIND, format!("duplicate id {} in one batch", id)));
        }
    }
    Ok(())
}

/// Reconcile one batch against the live table.
///
/// Returns every entity of the batch as it now stands in the live table.
/// Outcomes are added to `counts` row by row, so a batch that fails midway
/// leaves the rows it already staged counted.
pub fn upsert<E: Entity>(
    conn: &Connection,
    ctx: &RunContext,
    incoming: Vec<E>,
    counts: &mut MergeCounts,
) -> Result<Vec<Stored<E>>, SyncError> {
    let _span = info_span!("reconcile", kind = %E::KIND, count = incoming.len()).entered();
    check_batch(&incoming)?;

    let now = ctx.started_at;
    let mut persisted = Vec::with_capacity(incoming.len());

    for entity in incoming {
        let id = entity.id();
        let version = match live::get::<E>(conn, id)? {
            None => {
                let version = history::last_version::<E>(conn, id)?.map_or(1, |last| last + 1);
                live::insert(conn, &entity, version, now)?;
                debug!(id, version, "Inserted");
                counts.inserted += 1;
                version
            }
            Some(current) => {
                let changed = changed_fields(&current.entity, &entity)?;
                if changed.is_empty() {
                    live::touch::<E>(conn, id, now)?;
                    trace!(id, "Unchanged");
                    counts.unchanged += 1;
                    current.version
                } else {
                    history::append(conn, &current.entity, current.version, now, false)?;
                    let version = current.version + 1;
                    live::update(conn, &entity, version, now)?;
                    debug!(id, version, fields = ?changed, "Updated");
                    counts.changed += 1;
                    version
                }
            }
        };

        persisted.push(Stored {
            entity,
            version,
            touched_at: now,
        });
    }

    debug!(
        inserted = counts.inserted,
        changed = counts.changed,
        unchanged = counts.unchanged,
        "Batch reconciled"
    );
    Ok(persisted)
}
