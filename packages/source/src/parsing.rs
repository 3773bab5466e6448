//! Shared parsing utilities for fire incident feeds.
//!
//! Socrata date parsing and the minute arithmetic used by the normalizer.

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};

/// Parses a Socrata datetime string (ISO 8601 with optional fractional seconds).
#[must_use]
pub fn parse_socrata_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

/// Converts a signed duration to fractional minutes.
#[must_use]
pub fn delta_minutes(delta: TimeDelta) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let millis = delta.num_milliseconds() as f64;
    millis / 60_000.0
}
