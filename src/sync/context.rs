use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SyncError;
use crate::store::time::truncate_to_micros;

/// Inclusive date range bounding the windowed fetch of time entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateWindow {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, SyncError> {
        let window = Self { from, to };
        window.validate()?;
        Ok(window)
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.from > self.to {
            return Err(SyncError::Config(format!(
                "window start {} is after window end {}",
                self.from, self.to
            )));
        }
        Ok(())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.from, self.to)
    }
}

/// Per-run state handed to every reconcile and reap step.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    /// Single reference instant for every write of the run. Truncated to the
    /// precision the store keeps.
    pub started_at: DateTime<Utc>,
    pub window: DateWindow,
}

impl RunContext {
    pub fn new(window: DateWindow, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: truncate_to_micros(started_at),
            window,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let window = DateWindow::new(date(2024, 5, 1), date(2024, 5, 31)).unwrap();
        assert!(window.contains(date(2024, 5, 1)));
        assert!(window.contains(date(2024, 5, 31)));
        assert!(!window.contains(date(2024, 4, 30)));
        assert!(!window.contains(date(2024, 6, 1)));
    }

    #[test]
    fn test_inverted_window_is_rejected() {
        let err = DateWindow::new(date(2024, 6, 1), date(2024, 5, 1)).unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
        assert!(DateWindow::new(date(2024, 6, 1), date(2024, 6, 1)).is_ok());
    }
}
