//! Run coordinator
//!
//! Drives one run through its phases inside a single write transaction:
//!
//! ```text
//! Start -> FetchParents -> UpsertParents
//!       -> per project: FetchChildren -> UpsertChildren
//!       -> ReapAll -> Commit
//! ```
//!
//! Any failure drops the transaction, leaving the store exactly as it was.
//! Dropping the run future (cancellation) does the same.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::context::{DateWindow, RunContext};
use super::reap::{reap, reap_windowed};
use super::reconcile::{narrow, upsert, MergeCounts};
use super::report::{RunFailure, RunPhase, RunResult, TypeCounts};
use crate::error::{Scope, StoreError, SyncError};
use crate::model::{Client, DayEntry, Entity, EntityKind, Expense, Invoice, Project, Stored, Task, TaskAssignment, User};
use crate::source::{HarvestSource, Modules};
use crate::store::{runs, RunRecord, Store};

/// Owns the store for the duration of each run.
pub struct SyncCoordinator<S> {
    store: Store,
    source: S,
}

/// Where the run currently is, and what it has staged so far.
struct Progress {
    phase: RunPhase,
    kind: Option<EntityKind>,
    scope: Option<Scope>,
    counts: BTreeMap<EntityKind, TypeCounts>,
}

impl Progress {
    fn new() -> Self {
        Self {
            phase: RunPhase::Start,
            kind: None,
            scope: None,
            counts: BTreeMap::new(),
        }
    }

    fn enter(&mut self, phase: RunPhase, kind: Option<EntityKind>, scope: Option<Scope>) {
        self.phase = phase;
        self.kind = kind;
        self.scope = scope;
    }

    fn counts_mut(&mut self, kind: EntityKind) -> &mut TypeCounts {
        self.counts.entry(kind).or_default()
    }

    fn into_result(self, ctx: &RunContext, error: Option<SyncError>) -> RunResult {
        let failure = error.map(|e| RunFailure {
            phase: self.phase,
            kind: self.kind,
            scope: self.scope,
            message: e.to_string(),
        });
        RunResult {
            run_id: ctx.run_id,
            started_at: ctx.started_at,
            committed: failure.is_none(),
            counts: self.counts,
            failure,
        }
    }
}

impl<S: HarvestSource> SyncCoordinator<S> {
    pub fn new(store: Store, source: S) -> Self {
        Self { store, source }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_parts(self) -> (Store, S) {
        (self.store, self.source)
    }

    /// Run one sync with the current time as reference instant.
    pub async fn run_sync(&mut self, window: DateWindow) -> Result<RunResult, SyncError> {
        self.run_sync_at(window, Utc::now()).await
    }

    /// Run one sync with a caller-supplied reference instant.
    ///
    /// `Err` is returned before anything is staged: for an invalid window, a
    /// reference instant not after the last committed run
    /// ([`SyncError::Config`]), or a store that cannot open the run
    /// transaction or read the run log ([`SyncError::Storage`]). A run that
    /// starts and then fails yields `Ok` with `committed == false` and the
    /// failure details.
    pub async fn run_sync_at(
        &mut self,
        window: DateWindow,
        started_at: DateTime<Utc>,
    ) -> Result<RunResult, SyncError> {
        window.validate()?;
        let ctx = RunContext::new(window, started_at);
        let span = info_span!("sync_run", run_id = %ctx.run_id);
        self.run(&ctx).instrument(span).await
    }

    async fn run(&mut self, ctx: &RunContext) -> Result<RunResult, SyncError> {
        let tx = self.store.begin()?;

        if let Some(last) = runs::last_started_at(&tx)? {
            if ctx.started_at <= last {
                return Err(SyncError::Config(format!(
                    "run instant {} is not after the last committed run at {}",
                    ctx.started_at, last
                )));
            }
        }

        info!(window = %ctx.window, started_at = %ctx.started_at, "Starting sync run");
        let mut progress = Progress::new();

        let outcome = match stage(&tx, &self.source, ctx, &mut progress).await {
            Ok(()) => {
                progress.enter(RunPhase::Commit, None, None);
                commit(tx, ctx, &progress.counts)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback() {
                    warn!(error = %rollback, "Explicit rollback failed, relying on drop");
                }
                Err(e)
            }
        };

        match outcome {
            Ok(()) => {
                for (kind, counts) in &progress.counts {
                    info!(
                        %kind,
                        inserted = counts.inserted,
                        changed = counts.changed,
                        unchanged = counts.unchanged,
                        removed = counts.removed,
                        "Synced"
                    );
                }
                info!("Sync run committed");
                Ok(progress.into_result(ctx, None))
            }
            Err(e) => {
                error!(phase = %progress.phase, error = %e, "Sync run rolled back");
                Ok(progress.into_result(ctx, Some(e)))
            }
        }
    }
}

fn commit(
    tx: rusqlite::Transaction<'_>,
    ctx: &RunContext,
    counts: &BTreeMap<EntityKind, TypeCounts>,
) -> Result<(), SyncError> {
    let record = RunRecord {
        run_id: ctx.run_id.to_string(),
        started_at: ctx.started_at,
        window_from: ctx.window.from,
        window_to: ctx.window.to,
        finished_at: Utc::now(),
        counts_json: serde_json::to_string(counts).map_err(|source| StoreError::Encode {
            what: "run counts",
            source,
        })?,
    };
    runs::record(&tx, &record)?;
    tx.commit().map_err(StoreError::sql("commit", "database"))?;
    Ok(())
}

async fn stage<S: HarvestSource>(
    tx: &Connection,
    source: &S,
    ctx: &RunContext,
    progress: &mut Progress,
) -> Result<(), SyncError> {
    progress.enter(RunPhase::FetchParents, None, Some(Scope::All));
    let modules = source.modules().await.map_err(SyncError::Account)?;
    debug!(expenses = modules.expenses, invoices = modules.invoices, "Account modules");

    let users = fetch_all::<User, S>(source, progress).await?;
    let tasks = fetch_all::<Task, S>(source, progress).await?;
    let clients = fetch_all::<Client, S>(source, progress).await?;
    let invoices = if modules.invoices {
        Some(fetch_all::<Invoice, S>(source, progress).await?)
    } else {
        None
    };
    let projects = fetch_all::<Project, S>(source, progress).await?;

    merge(tx, ctx, progress, RunPhase::UpsertParents, Scope::All, users)?;
    merge(tx, ctx, progress, RunPhase::UpsertParents, Scope::All, tasks)?;
    merge(tx, ctx, progress, RunPhase::UpsertParents, Scope::All, clients)?;
    if let Some(invoices) = invoices {
        merge(tx, ctx, progress, RunPhase::UpsertParents, Scope::All, invoices)?;
    }
    let projects = merge(tx, ctx, progress, RunPhase::UpsertParents, Scope::All, projects)?;

    for project in &projects {
        let project_id = project.entity.id;
        let span = info_span!("project", project_id, name = %project.entity.name);
        stage_project(tx, source, ctx, progress, project_id, modules)
            .instrument(span)
            .await?;
    }

    // Parents first, so children of a vanished project are swept with it.
    sweep::<User>(tx, ctx, progress)?;
    sweep::<Task>(tx, ctx, progress)?;
    sweep::<Client>(tx, ctx, progress)?;
    if modules.invoices {
        sweep::<Invoice>(tx, ctx, progress)?;
    }
    sweep::<Project>(tx, ctx, progress)?;
    sweep::<TaskAssignment>(tx, ctx, progress)?;
    if modules.expenses {
        sweep::<Expense>(tx, ctx, progress)?;
    }

    progress.enter(RunPhase::ReapAll, Some(EntityKind::DayEntry), Some(Scope::All));
    let removed = reap_windowed::<DayEntry>(tx, ctx, Scope::All)?;
    progress.counts_mut(EntityKind::DayEntry).removed += removed;

    Ok(())
}

async fn stage_project<S: HarvestSource>(
    tx: &Connection,
    source: &S,
    ctx: &RunContext,
    progress: &mut Progress,
    project_id: i64,
    modules: Modules,
) -> Result<(), SyncError> {
    let scope = Scope::Project(project_id);

    let assignments = fetch_for_parent::<TaskAssignment, S>(source, progress, project_id).await?;
    let expenses = if modules.expenses {
        Some(fetch_for_parent::<Expense, S>(source, progress, project_id).await?)
    } else {
        None
    };

    progress.enter(RunPhase::FetchChildren, Some(EntityKind::DayEntry), Some(scope));
    let entries = source
        .fetch_windowed(EntityKind::DayEntry, project_id, ctx.window)
        .await
        .map_err(SyncError::fetch(EntityKind::DayEntry, scope))?;
    debug!(kind = %EntityKind::DayEntry, count = entries.len(), "Fetched");
    let entries = narrow::<DayEntry>(entries)?;

    merge(tx, ctx, progress, RunPhase::UpsertChildren, scope, assignments)?;
    if let Some(expenses) = expenses {
        merge(tx, ctx, progress, RunPhase::UpsertChildren, scope, expenses)?;
    }
    merge(tx, ctx, progress, RunPhase::UpsertChildren, scope, entries)?;
    Ok(())
}

async fn fetch_all<E: Entity, S: HarvestSource>(source: &S, progress: &mut Progress) -> Result<Vec<E>, SyncError> {
    progress.enter(RunPhase::FetchParents, Some(E::KIND), Some(Scope::All));
    let records = source
        .fetch_all(E::KIND)
        .await
        .map_err(SyncError::fetch(E::KIND, Scope::All))?;
    debug!(kind = %E::KIND, count = records.len(), "Fetched");
    narrow(records)
}

async fn fetch_for_parent<E: Entity, S: HarvestSource>(
    source: &S,
    progress: &mut Progress,
    project_id: i64,
) -> Result<Vec<E>, SyncError> {
    let scope = Scope::Project(project_id);
    progress.enter(RunPhase::FetchChildren, Some(E::KIND), Some(scope));
    let records = source
        .fetch_for_parent(E::KIND, project_id)
        .await
        .map_err(SyncError::fetch(E::KIND, scope))?;
    debug!(kind = %E::KIND, count = records.len(), "Fetched");
    narrow(records)
}

fn merge<E: Entity>(
    tx: &Connection,
    ctx: &RunContext,
    progress: &mut Progress,
    phase: RunPhase,
    scope: Scope,
    incoming: Vec<E>,
) -> Result<Vec<Stored<E>>, SyncError> {
    progress.enter(phase, Some(E::KIND), Some(scope));
    let mut counts = MergeCounts::default();
    let persisted = upsert(tx, ctx, incoming, &mut counts);
    progress.counts_mut(E::KIND).absorb(&counts);
    persisted
}

fn sweep<E: Entity>(tx: &Connection, ctx: &RunContext, progress: &mut Progress) -> Result<(), SyncError> {
    progress.enter(RunPhase::ReapAll, Some(E::KIND), Some(Scope::All));
    let removed = reap::<E>(tx, ctx, Scope::All)?;
    progress.counts_mut(E::KIND).removed += removed;
    Ok(())
}
