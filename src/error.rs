//! Error types for harvest-sync

use std::fmt;

use thiserror::Error;

use crate::model::EntityKind;

/// Errors raised by the remote fetch collaborator.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Malformed payload: {0}")]
    Decode(String),

    #[error("{kind} is missing required field `{field}`")]
    MissingField { kind: String, field: String },

    #[error("Unsupported request: {0}")]
    Unsupported(String),

    #[error("Invalid account URI: {0}")]
    InvalidUri(String),
}

/// Errors raised by the local store. Always carries the failing statement's
/// context next to the untouched driver error.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{operation} on {table} failed: {source}")]
    Sql {
        operation: &'static str,
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Failed to open database at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub(crate) fn sql(operation: &'static str, table: &'static str) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| StoreError::Sql { operation, table, source }
    }
}

/// Which slice of the remote data a fetch covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "id")]
pub enum Scope {
    All,
    Project(i64),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::All => write!(f, "all"),
            Scope::Project(id) => write!(f, "project {}", id),
        }
    }
}

/// Errors that abort a sync run.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Fetch of {kind} ({scope}) failed: {source}")]
    Fetch {
        kind: EntityKind,
        scope: Scope,
        #[source]
        source: SourceError,
    },

    #[error("Fetch of account modules failed: {0}")]
    Account(#[source] SourceError),

    #[error("Integrity violation in {kind}: {reason}")]
    Integrity { kind: EntityKind, reason: String },

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Wrap a failed fetch. A record lacking a required field is an
    /// integrity violation rather than a transport problem.
    pub(crate) fn fetch(kind: EntityKind, scope: Scope) -> impl FnOnce(SourceError) -> Self {
        move |source| match source {
            SourceError::MissingField { .. } => SyncError::integrity(kind, source.to_string()),
            source => SyncError::Fetch { kind, scope, source },
        }
    }

    pub(crate) fn integrity(kind: EntityKind, reason: impl Into<String>) -> Self {
        SyncError::Integrity {
            kind,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_becomes_integrity_violation() {
        let missing = SourceError::MissingField {
            kind: "user".into(),
            field: "email".into(),
        };
        let err = SyncError::fetch(EntityKind::User, Scope::All)(missing);
        assert!(matches!(
            &err,
            SyncError::Integrity { kind: EntityKind::User, reason } if reason == "user is missing required field `email`"
        ));

        let err = SyncError::fetch(EntityKind::User, Scope::Project(3))(SourceError::Decode("bad".into()));
        assert!(matches!(err, SyncError::Fetch { scope: Scope::Project(3), .. }));
    }
}
