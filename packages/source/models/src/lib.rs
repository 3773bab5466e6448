#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Canonical normalized fire incident format and the option types that
//! control how raw feed records are mapped into it.
//!
//! Every city feed (LAFD response metrics, FDNY fire incident dispatch)
//! produces [`NormalizedIncident`] records regardless of how the feed names
//! or formats its timestamp fields.

use std::fmt;

use chrono::{NaiveDate, NaiveTime, Timelike as _};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Number of minutes in a day. Valid minute-of-day values are `0..1440`.
pub const MINUTES_PER_DAY: u16 = 1_440;

/// Rounds to two decimal places.
#[must_use]
pub fn round_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// How the time-of-day bucket key of a fact row is represented.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BucketKeyFormat {
    /// Minute-precision clock time (`"HH:MM"`).
    #[default]
    Clock,
    /// Integer minutes since midnight (`0..1440`).
    MinuteOfDay,
}

/// What to do when the on-scene time precedes the creation time.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NegativeResponsePolicy {
    /// Keep the negative value as computed.
    #[default]
    PassThrough,
    /// Skip the record.
    Reject,
    /// Replace the value with `0.0`.
    Clamp,
    /// Add 24 hours, treating the on-scene time as the next day.
    WrapMidnight,
}

/// The time-of-day key a fact row is bucketed by.
///
/// Both representations expose the same minute-of-day, so aggregation
/// does not care which one a source was configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BucketKey {
    /// Minute-precision clock time.
    Clock {
        /// Hour of day (`0..24`).
        hour: u8,
        /// Minute of hour (`0..60`).
        minute: u8,
    },
    /// Minutes since midnight.
    MinuteOfDay(u16),
}

impl BucketKey {
    /// Builds a key from a wall-clock time, truncating to the minute.
    #[must_use]
    pub fn from_time(time: NaiveTime, format: BucketKeyFormat) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let (hour, minute) = (time.hour() as u8, time.minute() as u8);
        match format {
            BucketKeyFormat::Clock => Self::Clock { hour, minute },
            BucketKeyFormat::MinuteOfDay => {
                Self::MinuteOfDay(u16::from(hour) * 60 + u16::from(minute))
            }
        }
    }

    /// Parses a key previously rendered with [`fmt::Display`].
    ///
    /// Returns `None` for out-of-range or malformed values.
    #[must_use]
    pub fn parse(format: BucketKeyFormat, s: &str) -> Option<Self> {
        match format {
            BucketKeyFormat::Clock => {
                let (h, m) = s.split_once(':')?;
                let hour = h.parse::<u8>().ok()?;
                let minute = m.parse::<u8>().ok()?;
                (hour < 24 && minute < 60).then_some(Self::Clock { hour, minute })
            }
            BucketKeyFormat::MinuteOfDay => {
                let minutes = s.parse::<u16>().ok()?;
                (minutes < MINUTES_PER_DAY).then_some(Self::MinuteOfDay(minutes))
            }
        }
    }

    /// Minutes since midnight.
    #[must_use]
    pub const fn minute_of_day(&self) -> u16 {
        match *self {
            #[allow(clippy::cast_lossless)]
            Self::Clock { hour, minute } => hour as u16 * 60 + minute as u16,
            Self::MinuteOfDay(minutes) => minutes,
        }
    }

    /// The representation this key was built with.
    #[must_use]
    pub const fn format(&self) -> BucketKeyFormat {
        match self {
            Self::Clock { .. } => BucketKeyFormat::Clock,
            Self::MinuteOfDay(_) => BucketKeyFormat::MinuteOfDay,
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clock { hour, minute } => write!(f, "{hour:02}:{minute:02}"),
            Self::MinuteOfDay(minutes) => write!(f, "{minutes}"),
        }
    }
}

/// A fire incident normalized to the canonical schema.
///
/// Produced only from raw records carrying both a creation timestamp and an
/// on-scene timestamp that parse under the source's configured format.
/// `response_minutes` is negative only when the source's
/// [`NegativeResponsePolicy`] is [`NegativeResponsePolicy::PassThrough`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedIncident {
    /// Original incident ID from the feed, when the mapping names one.
    pub source_incident_id: Option<String>,
    /// Time-of-day bucket key of the incident creation time.
    pub occurred_at: BucketKey,
    /// Calendar date of the incident, when the feed provides one.
    pub occurred_date: Option<NaiveDate>,
    /// Minutes from incident creation to first unit on scene, rounded to
    /// two decimal places.
    pub response_minutes: f64,
    /// Neighborhood, district or borough the incident belongs to.
    pub locality: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_hundredths() {
        assert!((round_hundredths(7.456) - 7.46).abs() < f64::EPSILON);
        assert!((round_hundredths(-1.234) - -1.23).abs() < f64::EPSILON);
        assert!((round_hundredths(6.25) - 6.25).abs() < f64::EPSILON);
    }

    #[test]
    fn clock_key_renders_zero_padded() {
        let time = NaiveTime::from_hms_opt(8, 5, 59).unwrap();
        let key = BucketKey::from_time(time, BucketKeyFormat::Clock);
        assert_eq!(key.to_string(), "08:05");
        assert_eq!(key.minute_of_day(), 485);
    }

    #[test]
    fn minute_of_day_key_matches_clock_key() {
        let time = NaiveTime::from_hms_opt(23, 50, 0).unwrap();
        let clock = BucketKey::from_time(time, BucketKeyFormat::Clock);
        let index = BucketKey::from_time(time, BucketKeyFormat::MinuteOfDay);
        assert_eq!(index, BucketKey::MinuteOfDay(1430));
        assert_eq!(clock.minute_of_day(), index.minute_of_day());
        assert_eq!(index.to_string(), "1430");
    }

    #[test]
    fn parses_rendered_keys() {
        assert_eq!(
            BucketKey::parse(BucketKeyFormat::Clock, "10:15"),
            Some(BucketKey::Clock {
                hour: 10,
                minute: 15
            })
        );
        assert_eq!(
            BucketKey::parse(BucketKeyFormat::MinuteOfDay, "615"),
            Some(BucketKey::MinuteOfDay(615))
        );
    }

    #[test]
    fn rejects_out_of_range_keys() {
        assert!(BucketKey::parse(BucketKeyFormat::Clock, "24:00").is_none());
        assert!(BucketKey::parse(BucketKeyFormat::Clock, "10-15").is_none());
        assert!(BucketKey::parse(BucketKeyFormat::MinuteOfDay, "1440").is_none());
    }

    #[test]
    fn policy_parses_from_snake_case() {
        assert_eq!(
            "wrap_midnight".parse::<NegativeResponsePolicy>().unwrap(),
            NegativeResponsePolicy::WrapMidnight
        );
        assert_eq!(NegativeResponsePolicy::default().as_ref(), "pass_through");
    }
}
