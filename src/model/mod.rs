//! Entity model
//!
//! Every mirrored remote object is a plain struct carrying the remote `id` and
//! its business fields. Sync bookkeeping (`version`, `touched_at`) lives next
//! to the entity in [`Stored`], never inside it, so two entities compare equal
//! exactly when their remote state is equal.
//!
//! Structs are declared once through `entity!`, which also produces the
//! column list used for DDL, binding, change detection and history rows.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::{ToSqlOutput, Value};
use rusqlite::{Row, ToSql};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub use entities::{Client, DayEntry, Expense, Invoice, Project, Task, TaskAssignment, User};

/// The entity types mirrored from the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Client,
    Project,
    Task,
    TaskAssignment,
    Expense,
    Invoice,
    DayEntry,
}

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        EntityKind::User,
        EntityKind::Client,
        EntityKind::Project,
        EntityKind::Task,
        EntityKind::TaskAssignment,
        EntityKind::Expense,
        EntityKind::Invoice,
        EntityKind::DayEntry,
    ];

    /// Wire discriminator, also used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Client => "client",
            EntityKind::Project => "project",
            EntityKind::Task => "task",
            EntityKind::TaskAssignment => "task_assignment",
            EntityKind::Expense => "expense",
            EntityKind::Invoice => "invoice",
            EntityKind::DayEntry => "day_entry",
        }
    }

    /// Live table name.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::User => "users",
            EntityKind::Client => "clients",
            EntityKind::Project => "projects",
            EntityKind::Task => "tasks",
            EntityKind::TaskAssignment => "task_assignments",
            EntityKind::Expense => "expenses",
            EntityKind::Invoice => "invoices",
            EntityKind::DayEntry => "day_entries",
        }
    }

    /// Append-only history table name.
    pub fn history_table(&self) -> &'static str {
        match self {
            EntityKind::User => "users_history",
            EntityKind::Client => "clients_history",
            EntityKind::Project => "projects_history",
            EntityKind::Task => "tasks_history",
            EntityKind::TaskAssignment => "task_assignments_history",
            EntityKind::Expense => "expenses_history",
            EntityKind::Invoice => "invoices_history",
            EntityKind::DayEntry => "day_entries_history",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s || kind.table() == s)
            .ok_or_else(|| format!("unknown entity kind '{}'", s))
    }
}

/// A versioned business column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub sql_type: &'static str,
}

/// Behaviour shared by every mirrored entity type.
pub trait Entity: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: EntityKind;

    /// Versioned business columns, in declaration order. Excludes `id`.
    const COLUMNS: &'static [Column];

    /// Column referencing the parent project, for kinds fetched per project.
    const PARENT_COLUMN: Option<&'static str>;

    fn id(&self) -> i64;

    /// Business field values in [`Entity::COLUMNS`] order.
    fn field_values(&self) -> rusqlite::Result<Vec<Value>>;

    /// Decode from a live or history row (columns looked up by name).
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Narrow a decoded record to this type, handing it back on mismatch.
    fn from_record(record: Record) -> Result<Self, Record>;
}

/// Entity kinds that are only ever fetched for a bounded date window.
pub trait Windowed: Entity {
    /// Date column compared against the run's window.
    const DATE_COLUMN: &'static str;
}

/// An entity as persisted in its live table.
#[derive(Debug, Clone, Serialize)]
pub struct Stored<E> {
    #[serde(flatten)]
    pub entity: E,
    pub version: i64,
    pub touched_at: DateTime<Utc>,
}

/// A decoded remote object of any kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Record {
    User(User),
    Client(Client),
    Project(Project),
    Task(Task),
    TaskAssignment(TaskAssignment),
    Expense(Expense),
    Invoice(Invoice),
    DayEntry(DayEntry),
}

impl Record {
    pub fn kind(&self) -> EntityKind {
        match self {
            Record::User(_) => EntityKind::User,
            Record::Client(_) => EntityKind::Client,
            Record::Project(_) => EntityKind::Project,
            Record::Task(_) => EntityKind::Task,
            Record::TaskAssignment(_) => EntityKind::TaskAssignment,
            Record::Expense(_) => EntityKind::Expense,
            Record::Invoice(_) => EntityKind::Invoice,
            Record::DayEntry(_) => EntityKind::DayEntry,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Record::User(e) => e.id,
            Record::Client(e) => e.id,
            Record::Project(e) => e.id,
            Record::Task(e) => e.id,
            Record::TaskAssignment(e) => e.id,
            Record::Expense(e) => e.id,
            Record::Invoice(e) => e.id,
            Record::DayEntry(e) => e.id,
        }
    }
}

/// Convert any bindable field into an owned SQLite value.
pub(crate) fn to_value<T: ToSql>(field: &T) -> rusqlite::Result<Value> {
    match field.to_sql()? {
        ToSqlOutput::Borrowed(value) => Ok(value.into()),
        ToSqlOutput::Owned(value) => Ok(value),
        other => Err(rusqlite::Error::ToSqlConversionFailure(
            format!("unsupported column value {:?}", other).into(),
        )),
    }
}

/// Declares an entity struct together with its column metadata.
///
/// `parent` is `None` or `Some("<column>")` naming the parent project column.
macro_rules! entity {
    (
        $(#[$meta:meta])*
        $name:ident, parent = $parent:expr;
        {
            $(
                $(#[$fmeta:meta])*
                $field:ident : $ty:ty = $sql:literal
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        pub struct $name {
            pub id: i64,
            $(
                $(#[$fmeta])*
                pub $field: $ty,
            )*
        }

        impl $crate::model::Entity for $name {
            const KIND: $crate::model::EntityKind = $crate::model::EntityKind::$name;

            const COLUMNS: &'static [$crate::model::Column] = &[
                $( $crate::model::Column { name: stringify!($field), sql_type: $sql }, )*
            ];

            const PARENT_COLUMN: Option<&'static str> = $parent;

            fn id(&self) -> i64 {
                self.id
            }

            fn field_values(&self) -> rusqlite::Result<Vec<rusqlite::types::Value>> {
                Ok(vec![ $( $crate::model::to_value(&self.$field)?, )* ])
            }

            fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
                Ok(Self {
                    id: row.get("id")?,
                    $( $field: row.get(stringify!($field))?, )*
                })
            }

            fn from_record(record: $crate::model::Record) -> Result<Self, $crate::model::Record> {
                match record {
                    $crate::model::Record::$name(entity) => Ok(entity),
                    other => Err(other),
                }
            }
        }

        impl From<$name> for $crate::model::Record {
            fn from(entity: $name) -> Self {
                $crate::model::Record::$name(entity)
            }
        }
    };
}

mod entities;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_round_trip() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
            assert_eq!(kind.table().parse::<EntityKind>().unwrap(), kind);
            assert_eq!(kind.history_table(), format!("{}_history", kind.table()));
        }
        assert!("timesheet".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_columns_exclude_bookkeeping() {
        for columns in [Project::COLUMNS, DayEntry::COLUMNS, User::COLUMNS] {
            let names: Vec<_> = columns.iter().map(|c| c.name).collect();
            assert!(!names.contains(&"id"));
            assert!(!names.contains(&"version"));
            assert!(!names.contains(&"touched_at"));
        }
    }

    #[test]
    fn test_field_values_follow_column_order() {
        let task = Task {
            id: 7,
            name: "Admin".into(),
            billable_by_default: false,
            is_default: Some(true),
            default_hourly_rate: None,
            deactivated: true,
            created_at: None,
            updated_at: None,
        };
        let values = task.field_values().unwrap();
        assert_eq!(values.len(), Task::COLUMNS.len());
        assert_eq!(values[0], Value::Text("Admin".into()));
        assert_eq!(values[1], Value::Integer(0));
        assert_eq!(values[3], Value::Null);
    }

    #[test]
    fn test_record_narrowing() {
        let record = Record::from(Task {
            id: 3,
            name: "Dev".into(),
            billable_by_default: true,
            is_default: None,
            default_hourly_rate: None,
            deactivated: false,
            created_at: None,
            updated_at: None,
        });
        assert_eq!(record.kind(), EntityKind::Task);
        assert_eq!(record.id(), 3);

        let mismatch = Project::from_record(record.clone()).unwrap_err();
        assert_eq!(mismatch, record);
        assert_eq!(Task::from_record(record).unwrap().name, "Dev");
    }
}
