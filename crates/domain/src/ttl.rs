//! Ttl derivation for unreviewed requests.

use chrono::{DateTime, NaiveDateTime};
use elevate_core::{AppError, AppResult};
use serde_json::{Map, Value};

/// Seconds in one retention day.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Default retention before an unreviewed request expires.
pub const DEFAULT_RETENTION_DAYS: u32 = 1;

/// Record attribute the ttl is derived from.
pub const BASE_ATTRIBUTE: &str = "request_time";

/// Record attribute the ttl is written to.
pub const TTL_ATTRIBUTE: &str = "ttl";

const NAIVE_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%m/%d/%y %H:%M:%S",
];

/// Parses a timestamp string into epoch seconds.
///
/// Accepts RFC 3339, ISO-8601 without offset, and the legacy `MM/DD/YY HH:MM:SS` form.
/// Timestamps without an offset are read as UTC.
pub fn parse_timestamp_epoch(value: &str) -> AppResult<i64> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.timestamp());
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|parsed| parsed.and_utc().timestamp())
        .ok_or_else(|| AppError::UnparsableTimestamp(format!("'{value}' is not a timestamp")))
}

/// Reads the base attribute of a record image as epoch seconds.
pub fn base_epoch_seconds(image: &Map<String, Value>) -> AppResult<i64> {
    match image.get(BASE_ATTRIBUTE) {
        None | Some(Value::Null) => Err(AppError::MissingBaseAttribute(format!(
            "record has no '{BASE_ATTRIBUTE}'"
        ))),
        Some(Value::String(value)) => parse_timestamp_epoch(value),
        Some(Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|seconds| seconds.trunc() as i64))
            .ok_or_else(|| {
                AppError::UnparsableTimestamp(format!("'{number}' is not an epoch timestamp"))
            }),
        Some(other) => Err(AppError::UnparsableTimestamp(format!(
            "'{BASE_ATTRIBUTE}' has unsupported value {other}"
        ))),
    }
}

/// Computes `base + retention_days` in epoch seconds.
#[must_use]
pub fn compute_ttl(base_epoch_seconds: i64, retention_days: u32) -> i64 {
    base_epoch_seconds.saturating_add(i64::from(retention_days).saturating_mul(SECONDS_PER_DAY))
}

#[cfg(test)]
mod tests {
    use elevate_core::AppError;
    use proptest::prelude::*;
    use serde_json::{Map, Value, json};

    use super::{base_epoch_seconds, compute_ttl, parse_timestamp_epoch};

    fn image(value: Value) -> Map<String, Value> {
        let mut image = Map::new();
        image.insert("request_time".to_owned(), value);
        image
    }

    #[test]
    fn parses_every_accepted_format() {
        assert_eq!(parse_timestamp_epoch("2023-11-14T22:13:20.000000").ok(), Some(1_700_000_000));
        assert_eq!(parse_timestamp_epoch("2023-11-14T22:13:20Z").ok(), Some(1_700_000_000));
        assert_eq!(parse_timestamp_epoch("2023-11-15T00:13:20+02:00").ok(), Some(1_700_000_000));
        assert_eq!(parse_timestamp_epoch("2023-11-14 22:13:20").ok(), Some(1_700_000_000));
        assert_eq!(parse_timestamp_epoch("11/14/23 22:13:20").ok(), Some(1_700_000_000));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            parse_timestamp_epoch("yesterday"),
            Err(AppError::UnparsableTimestamp(_))
        ));
    }

    #[test]
    fn base_attribute_may_be_numeric() {
        assert_eq!(base_epoch_seconds(&image(json!(1_700_000_000))).ok(), Some(1_700_000_000));
    }

    #[test]
    fn missing_base_attribute_is_reported() {
        assert!(matches!(
            base_epoch_seconds(&Map::new()),
            Err(AppError::MissingBaseAttribute(_))
        ));
        assert!(matches!(
            base_epoch_seconds(&image(Value::Null)),
            Err(AppError::MissingBaseAttribute(_))
        ));
        assert!(matches!(
            base_epoch_seconds(&image(json!(true))),
            Err(AppError::UnparsableTimestamp(_))
        ));
    }

    #[test]
    fn one_day_retention() {
        assert_eq!(compute_ttl(1_700_000_000, 1), 1_700_086_400);
    }

    proptest! {
        #[test]
        fn ttl_grows_linearly_with_retention(base in 0_i64..4_000_000_000, days in 0_u32..3650) {
            prop_assert_eq!(compute_ttl(base, days) - base, i64::from(days) * 86_400);
            prop_assert_eq!(compute_ttl(base, days + 1) - compute_ttl(base, days), 86_400);
        }
    }
}
