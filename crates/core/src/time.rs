use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::ValidationError;

/// Convert an ISO-8601 timestamp to Unix seconds.
///
/// Inputs with an offset (`2024-01-01T00:00:00+02:00`, `...Z`) are honored;
/// naive inputs are taken as UTC.
pub fn to_unix_timestamp(value: &str) -> Option<i64> {
    parse_iso8601(value).map(|dt| dt.timestamp())
}

/// Parse a required timestamp parameter, reporting `field` on failure.
pub fn parse_timestamp_param(field: &'static str, value: &str) -> Result<i64, ValidationError> {
    to_unix_timestamp(value).ok_or_else(|| ValidationError::InvalidTimestamp {
        field,
        value: value.to_string(),
    })
}

fn parse_iso8601(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    // ISO-8601 basic offsets such as +0000, which RFC 3339 does not allow.
    for fmt in ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    let formats = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
    ];

    for fmt in &formats {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
