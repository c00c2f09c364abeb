//! Instant encoding for sync bookkeeping columns
//!
//! `touched_at`, `changed_at` and run timestamps are stored as fixed-width UTC
//! text so that `<` in SQL orders them chronologically.

use chrono::{DateTime, NaiveDateTime, TimeZone, Timelike, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Value, ValueRef};
use rusqlite::ToSql;

const INSTANT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Drop sub-microsecond precision so an instant survives a store round trip.
pub fn truncate_to_micros(instant: DateTime<Utc>) -> DateTime<Utc> {
    let nanos = instant.nanosecond() / 1_000 * 1_000;
    instant.with_nanosecond(nanos).unwrap_or(instant)
}

pub fn format_instant(instant: &DateTime<Utc>) -> String {
    instant.format(INSTANT_FORMAT).to_string()
}

pub fn parse_instant(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw, INSTANT_FORMAT).map(|naive| Utc.from_utc_datetime(&naive))
}

/// A UTC instant bound and read in the fixed-width text encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SqlInstant(pub DateTime<Utc>);

impl ToSql for SqlInstant {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Owned(Value::Text(format_instant(&self.0))))
    }
}

impl FromSql for SqlInstant {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        parse_instant(raw)
            .map(SqlInstant)
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_is_fixed_width_and_ordered() {
        let early = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let late = early + chrono::Duration::microseconds(1);

        let a = format_instant(&early);
        let b = format_instant(&late);
        assert_eq!(a, "2024-01-02T03:04:05.000000Z");
        assert_eq!(a.len(), b.len());
        assert!(a < b);
    }

    #[test]
    fn test_round_trip_after_truncation() {
        let now = truncate_to_micros(Utc::now());
        let parsed = parse_instant(&format_instant(&now)).unwrap();
        assert_eq!(parsed, now);
    }
}
