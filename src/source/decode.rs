//! Payload decoding
//!
//! The remote API wraps every object in a single-key envelope naming its type:
//!
//! ```json
//! [{ "project": { "id": 3554414, "name": "Internal", ... } }]
//! ```
//!
//! The key is looked up in a fixed table of decoders, one per entity kind.

use serde_json::Value;

use crate::error::SourceError;
use crate::model::{Client, DayEntry, Entity, Expense, Invoice, Project, Record, Task, TaskAssignment, User};

type Decoder = fn(Value) -> Result<Record, serde_json::Error>;

fn decode_as<E: Entity + Into<Record>>(fields: Value) -> Result<Record, serde_json::Error> {
    serde_json::from_value::<E>(fields).map(Into::into)
}

const DECODERS: &[(&str, Decoder)] = &[
    ("user", decode_as::<User> as Decoder),
    ("client", decode_as::<Client> as Decoder),
    ("project", decode_as::<Project> as Decoder),
    ("task", decode_as::<Task> as Decoder),
    ("task_assignment", decode_as::<TaskAssignment> as Decoder),
    ("expense", decode_as::<Expense> as Decoder),
    ("invoice", decode_as::<Invoice> as Decoder),
    ("day_entry", decode_as::<DayEntry> as Decoder),
];

fn decoder_for(discriminator: &str) -> Option<Decoder> {
    DECODERS
        .iter()
        .find(|(name, _)| *name == discriminator)
        .map(|(_, decoder)| *decoder)
}

/// Decode one `{ "<kind>": { ... } }` envelope.
pub fn decode_record(envelope: Value) -> Result<Record, SourceError> {
    let Value::Object(map) = envelope else {
        return Err(SourceError::Decode(format!("expected an object, got {}", envelope)));
    };
    if map.len() != 1 {
        let keys: Vec<_> = map.keys().cloned().collect();
        return Err(SourceError::Decode(format!(
            "expected a single-key envelope, got keys {:?}",
            keys
        )));
    }

    let Some((discriminator, fields)) = map.into_iter().next() else {
        return Err(SourceError::Decode("empty envelope".to_string()));
    };
    let decoder = decoder_for(&discriminator)
        .ok_or_else(|| SourceError::Decode(format!("unknown type '{}'", discriminator)))?;

    decoder(fields).map_err(|e| match missing_field(&e) {
        Some(field) => SourceError::MissingField {
            kind: discriminator.clone(),
            field,
        },
        None => SourceError::Decode(format!("{}: {}", discriminator, e)),
    })
}

/// Name of the absent field when serde rejected a record for lacking one.
fn missing_field(error: &serde_json::Error) -> Option<String> {
    let message = error.to_string();
    let rest = message.strip_prefix("missing field `")?;
    rest.split('`').next().map(str::to_string)
}

/// Decode a JSON array of envelopes.
pub fn decode_list(payload: Value) -> Result<Vec<Record>, SourceError> {
    match payload {
        Value::Array(items) => items.into_iter().map(decode_record).collect(),
        other => Err(SourceError::Decode(format!("expected an array, got {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityKind;
    use serde_json::json;

    #[test]
    fn test_decode_project_envelope() {
        let record = decode_record(json!({
            "project": {
                "id": 3554414,
                "client_id": 3398386,
                "name": "Internal",
                "code": "Testing",
                "active": true,
                "billable": true,
                "bill_by": "People",
                "hourly_rate": 100,
                "budget": 100,
                "starts_on": "2013-04-30",
                "created_at": "2013-04-30T20:28:12Z",
                "cost_budget": null,
                "some_future_field": "ignored"
            }
        }))
        .unwrap();

        let Record::Project(project) = record else {
            panic!("expected a project");
        };
        assert_eq!(project.id, 3554414);
        assert_eq!(project.name, "Internal");
        assert_eq!(project.hourly_rate, Some(100.0));
        assert_eq!(project.cost_budget, None);
        assert_eq!(project.starts_on, chrono::NaiveDate::from_ymd_opt(2013, 4, 30));
    }

    #[test]
    fn test_every_kind_has_a_decoder() {
        for kind in EntityKind::ALL {
            assert!(decoder_for(kind.as_str()).is_some(), "no decoder for {}", kind);
        }
    }

    #[test]
    fn test_decode_list_of_mixed_envelopes() {
        let records = decode_list(json!([
            { "task": { "id": 1, "name": "Admin", "deactivated": true } },
            { "client": { "id": 2, "name": "Acme" } }
        ]))
        .unwrap();
        let kinds: Vec<_> = records.iter().map(Record::kind).collect();
        assert_eq!(kinds, vec![EntityKind::Task, EntityKind::Client]);
    }

    #[test]
    fn test_rejects_malformed_envelopes() {
        assert!(decode_record(json!({ "timesheet": { "id": 1 } })).is_err());
        assert!(decode_record(json!({ "task": { "id": 1 }, "client": { "id": 2 } })).is_err());
        assert!(decode_record(json!([1, 2])).is_err());
        assert!(decode_list(json!({ "task": { "id": 1, "name": "x" } })).is_err());
    }

    #[test]
    fn test_missing_required_field_is_named() {
        let err = decode_record(json!({ "user": { "id": 9, "first_name": "Ana" } })).unwrap_err();
        assert!(matches!(
            err,
            SourceError::MissingField { kind, field } if kind == "user" && field == "email"
        ));

        // A wrongly typed field is still a plain decode failure.
        let err = decode_record(json!({ "task": { "id": "nine", "name": "Dev" } })).unwrap_err();
        assert!(matches!(err, SourceError::Decode(msg) if msg.starts_with("task")));
    }
}
