//! Change detection
//!
//! Two snapshots of the same entity differ when any versioned column encodes
//! to a different SQLite value. Comparing encoded values means "changed" is
//! exactly "would store differently", so NULL and an absent optional field are
//! the same, and so are two timestamps that denote one instant.

use crate::error::StoreError;
use crate::model::Entity;

/// Names of the versioned columns whose values differ.
pub fn changed_fields<E: Entity>(current: &E, incoming: &E) -> Result<Vec<&'static str>, StoreError> {
    let table = E::KIND.table();
    let before = current.field_values().map_err(StoreError::sql("encode", table))?;
    let after = incoming.field_values().map_err(StoreError::sql("encode", table))?;

    Ok(E::COLUMNS
        .iter()
        .zip(before.iter().zip(after.iter()))
        .filter(|(_, (old, new))| old != new)
        .map(|(column, _)| column.name)
        .collect())
}

pub fn has_changed<E: Entity>(current: &E, incoming: &E) -> Result<bool, StoreError> {
    Ok(!changed_fields(current, incoming)?.is_empty())
}
