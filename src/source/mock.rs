//! In-memory source for tests
//!
//! Holds the "remote" state directly. Tests mutate it between runs to model
//! upstream edits, deletions and outages.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{HarvestSource, Modules};
use crate::error::SourceError;
use crate::model::{EntityKind, Record};
use crate::sync::DateWindow;

/// A [`HarvestSource`] serving canned records.
pub struct MockSource {
    modules: Modules,
    unscoped: HashMap<EntityKind, Vec<Record>>,
    per_parent: HashMap<(EntityKind, i64), Vec<Record>>,
    failing: HashSet<(EntityKind, Option<i64>)>,
    windows: Mutex<Vec<(i64, DateWindow)>>,
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSource {
    /// Empty account with every module enabled
    pub fn new() -> Self {
        Self {
            modules: Modules::all(),
            unscoped: HashMap::new(),
            per_parent: HashMap::new(),
            failing: HashSet::new(),
            windows: Mutex::new(Vec::new()),
        }
    }

    pub fn set_modules(&mut self, modules: Modules) {
        self.modules = modules;
    }

    /// Replace the full set of an unscoped kind.
    pub fn set_all<R: Into<Record>>(&mut self, kind: EntityKind, records: impl IntoIterator<Item = R>) {
        self.unscoped
            .insert(kind, records.into_iter().map(Into::into).collect());
    }

    /// Replace the children of one project.
    pub fn set_children<R: Into<Record>>(
        &mut self,
        kind: EntityKind,
        parent_id: i64,
        records: impl IntoIterator<Item = R>,
    ) {
        self.per_parent
            .insert((kind, parent_id), records.into_iter().map(Into::into).collect());
    }

    /// Make fetches of `kind` fail; `None` fails every scope.
    pub fn fail_on(&mut self, kind: EntityKind, parent_id: Option<i64>) {
        self.failing.insert((kind, parent_id));
    }

    pub fn clear_failures(&mut self) {
        self.failing.clear();
    }

    /// `(project id, window)` of every windowed fetch served so far.
    pub fn windowed_requests(&self) -> Vec<(i64, DateWindow)> {
        self.windows.lock().map(|w| w.clone()).unwrap_or_default()
    }

    fn check(&self, kind: EntityKind, parent_id: Option<i64>) -> Result<(), SourceError> {
        if self.failing.contains(&(kind, None)) || self.failing.contains(&(kind, parent_id)) {
            return Err(SourceError::Status {
                status: 503,
                url: format!("mock://{}", kind.table()),
            });
        }
        Ok(())
    }
}

fn spent_at(record: &Record) -> Option<chrono::NaiveDate> {
    match record {
        Record::DayEntry(entry) => Some(entry.spent_at),
        _ => None,
    }
}

#[async_trait]
impl HarvestSource for MockSource {
    async fn modules(&self) -> Result<Modules, SourceError> {
        Ok(self.modules)
    }

    async fn fetch_all(&self, kind: EntityKind) -> Result<Vec<Record>, SourceError> {
        self.check(kind, None)?;
        Ok(self.unscoped.get(&kind).cloned().unwrap_or_default())
    }

    async fn fetch_for_parent(&self, kind: EntityKind, parent_id: i64) -> Result<Vec<Record>, SourceError> {
        self.check(kind, Some(parent_id))?;
        Ok(self
            .per_parent
            .get(&(kind, parent_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_windowed(
        &self,
        kind: EntityKind,
        parent_id: i64,
        window: DateWindow,
    ) -> Result<Vec<Record>, SourceError> {
        self.check(kind, Some(parent_id))?;
        if let Ok(mut windows) = self.windows.lock() {
            windows.push((parent_id, window));
        }

        let records = self.per_parent.get(&(kind, parent_id)).into_iter().flatten();
        Ok(records
            .filter(|record| spent_at(record).map_or(true, |date| window.contains(date)))
            .cloned()
            .collect())
    }
}
