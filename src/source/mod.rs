//! Remote data source abstraction
//!
//! The sync core only ever sees [`HarvestSource`]. Implementations:
//! - [`HarvestClient`] - the remote REST API over HTTP
//! - [`MockSource`] - in-memory data for tests

pub mod decode;
pub mod http;
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::SourceError;
use crate::model::{EntityKind, Record};
use crate::sync::DateWindow;

pub use http::HarvestClient;
pub use mock::MockSource;

/// Optional remote modules that gate whole entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modules {
    #[serde(default, deserialize_with = "null_as_false")]
    pub expenses: bool,
    #[serde(default, deserialize_with = "null_as_false")]
    pub invoices: bool,
}

/// Module flags come back as `null` for accounts that never touched them.
fn null_as_false<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

impl Modules {
    pub fn all() -> Self {
        Self {
            expenses: true,
            invoices: true,
        }
    }
}

/// Supplies complete, fully populated snapshots of remote entities.
///
/// Every call either returns the whole requested set or fails; partial
/// results are never returned.
#[async_trait]
pub trait HarvestSource: Send + Sync {
    /// Which optional modules the account has enabled.
    async fn modules(&self) -> Result<Modules, SourceError>;

    /// Every entity of an unscoped kind (users, clients, tasks, invoices, projects).
    async fn fetch_all(&self, kind: EntityKind) -> Result<Vec<Record>, SourceError>;

    /// Every entity of a child kind belonging to one project.
    async fn fetch_for_parent(&self, kind: EntityKind, parent_id: i64) -> Result<Vec<Record>, SourceError>;

    /// Entities of a windowed kind for one project, dated inside `window`.
    async fn fetch_windowed(
        &self,
        kind: EntityKind,
        parent_id: i64,
        window: DateWindow,
    ) -> Result<Vec<Record>, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_or_missing_module_flags_are_disabled() {
        let modules: Modules = serde_json::from_value(json!({ "expenses": null, "invoices": true })).unwrap();
        assert_eq!(
            modules,
            Modules {
                expenses: false,
                invoices: true
            }
        );

        let modules: Modules = serde_json::from_value(json!({})).unwrap();
        assert_eq!(modules, Modules::default());
    }
}
