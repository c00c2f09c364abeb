//! Removal of entities that vanished upstream
//!
//! After all upserts of a run, any live row whose `touched_at` is older than
//! the run's reference instant was not seen and is removed. Its final state is
//! archived first with `deleted` set, at its current version.

use rusqlite::Connection;
use tracing::{debug, info, info_span};

use super::context::RunContext;
use crate::error::{Scope, SyncError};
use crate::model::{Entity, Windowed};
use crate::store::{history, live};

/// Archive and delete every stale row of `E` within `scope`.
pub fn reap<E: Entity>(conn: &Connection, ctx: &RunContext, scope: Scope) -> Result<u64, SyncError> {
    let _span = info_span!("reap", kind = %E::KIND, %scope).entered();

    let parent_id = match scope {
        Scope::All => None,
        Scope::Project(id) if E::PARENT_COLUMN.is_some() => Some(id),
        Scope::Project(_) => {
            return Err(SyncError::integrity(E::KIND, "has no parent project to scope by"));
        }
    };

    let stale = live::stale::<E>(conn, ctx.started_at, parent_id)?;
    for row in &stale {
        let id = row.entity.id();
        history::append(conn, &row.entity, row.version, ctx.started_at, true)?;
        live::delete::<E>(conn, id)?;
        debug!(id, version = row.version, last_seen = %row.touched_at, "Removed");
    }

    if !stale.is_empty() {
        info!(removed = stale.len(), "Reaped stale rows");
    }
    Ok(stale.len() as u64)
}

/// Touch rows dated outside the run's window so [`reap`] leaves them alone.
///
/// Windowed kinds are only fetched for the window; absence of an entry dated
/// elsewhere says nothing about whether it still exists.
pub fn exempt_outside_window<E: Windowed>(conn: &Connection, ctx: &RunContext) -> Result<u64, SyncError> {
    let exempted = live::touch_outside_window::<E>(conn, ctx.window.from, ctx.window.to, ctx.started_at)?;
    debug!(kind = %E::KIND, exempted, window = %ctx.window, "Exempted rows outside window");
    Ok(exempted as u64)
}

/// Window exemption followed by the reap, for windowed kinds.
pub fn reap_windowed<E: Windowed>(conn: &Connection, ctx: &RunContext, scope: Scope) -> Result<u64, SyncError> {
    exempt_outside_window::<E>(conn, ctx)?;
    reap::<E>(conn, ctx, scope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DayEntry, Project};
    use crate::store::Store;
    use crate::sync::reconcile::{upsert, MergeCounts};
    use crate::sync::DateWindow;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn ctx(offset_hours: i64, from: u32, to: u32) -> RunContext {
        let start = Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap();
        RunContext::new(DateWindow::new(date(from), date(to)).unwrap(), start + Duration::hours(offset_hours))
    }

    #[test]
    fn test_reap_archives_final_state() {
        let mut store = Store::open_in_memory().unwrap();
        let tx = store.begin().unwrap();
        upsert(
            &tx,
            &ctx(0, 1, 31),
            vec![Project::new(1, 10, "A"), Project::new(2, 10, "B")],
            &mut MergeCounts::default(),
        )
        .unwrap();

        let second = ctx(1, 1, 31);
        upsert(&tx, &second, vec![Project::new(1, 10, "A")], &mut MergeCounts::default()).unwrap();
        assert_eq!(reap::<Project>(&tx, &second, Scope::All).unwrap(), 1);

        assert!(live::get::<Project>(&tx, 2).unwrap().is_none());
        let archived = history::for_entity::<Project>(&tx, 2).unwrap();
        assert_eq!(archived.len(), 1);
        assert!(archived[0].deleted);
        assert_eq!(archived[0].version, 1);
        assert_eq!(archived[0].changed_at, second.started_at);
    }

    #[test]
    fn test_reap_scoped_to_one_project() {
        let mut store = Store::open_in_memory().unwrap();
        let tx = store.begin().unwrap();
        upsert(
            &tx,
            &ctx(0, 1, 31),
            vec![DayEntry::new(1, 100, 1, 1, date(2), 1.0), DayEntry::new(2, 200, 1, 1, date(2), 1.0)],
            &mut MergeCounts::default(),
        )
        .unwrap();

        let second = ctx(1, 1, 31);
        assert_eq!(reap::<DayEntry>(&tx, &second, Scope::Project(100)).unwrap(), 1);
        assert!(live::get::<DayEntry>(&tx, 2).unwrap().is_some());

        let err = reap::<Project>(&tx, &second, Scope::Project(100)).unwrap_err();
        assert!(matches!(err, SyncError::Integrity { .. }));
    }

    #[test]
    fn test_entries_outside_window_survive() {
        let mut store = Store::open_in_memory().unwrap();
        let tx = store.begin().unwrap();
        upsert(
            &tx,
            &ctx(0, 1, 31),
            vec![DayEntry::new(1, 100, 1, 1, date(3), 1.0), DayEntry::new(2, 100, 1, 1, date(15), 2.0)],
            &mut MergeCounts::default(),
        )
        .unwrap();

        // Nothing fetched for 10..=20: entry 2 is gone, entry 1 is out of view.
        let second = ctx(1, 10, 20);
        assert_eq!(reap_windowed::<DayEntry>(&tx, &second, Scope::All).unwrap(), 1);
        assert!(live::get::<DayEntry>(&tx, 1).unwrap().is_some());
        assert!(live::get::<DayEntry>(&tx, 2).unwrap().is_none());
    }
}
