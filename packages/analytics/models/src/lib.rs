#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aggregate result and report types for fire response analytics.
//!
//! The day is split into twelve fixed [`TimePeriod`]s of two hours each.
//! Their labels (`"00:00 - 01:59"` through `"22:00 - 23:59"`) are part of
//! the report format and must stay stable.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of two-hour periods in a day.
pub const PERIOD_COUNT: u8 = 12;

/// One of the twelve two-hour periods of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct TimePeriod(u8);

impl TimePeriod {
    /// Returns the period with the given index, or `None` if `index >= 12`.
    #[must_use]
    pub const fn new(index: u8) -> Option<Self> {
        if index < PERIOD_COUNT {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Returns the period containing a minute of the day.
    #[must_use]
    pub const fn from_minute_of_day(minute: u16) -> Option<Self> {
        let index = minute / 120;
        if index < PERIOD_COUNT as u16 {
            #[allow(clippy::cast_possible_truncation)]
            Some(Self(index as u8))
        } else {
            None
        }
    }

    /// All twelve periods in order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..PERIOD_COUNT).map(Self)
    }

    /// Zero-based index.
    #[must_use]
    pub const fn index(self) -> u8 {
        self.0
    }

    /// Report label, e.g. `"08:00 - 09:59"`.
    #[must_use]
    pub fn label(self) -> String {
        self.to_string()
    }

    /// Parses a label produced by [`Self::label`].
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::all().find(|p| p.label() == label)
    }
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let start = self.0 * 2;
        write!(f, "{start:02}:00 - {:02}:59", start + 1)
    }
}

impl TryFrom<u8> for TimePeriod {
    type Error = String;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Self::new(index).ok_or_else(|| format!("period index {index} out of range"))
    }
}

impl From<TimePeriod> for u8 {
    fn from(period: TimePeriod) -> Self {
        period.0
    }
}

/// Mean response time for one non-empty period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodAverage {
    /// The period.
    pub period: TimePeriod,
    /// Mean response minutes, rounded to two decimals.
    pub average_minutes: f64,
    /// Number of fact rows in the period.
    pub fire_count: u64,
}

/// Fire count for one locality. Zero-count localities are included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalityCount {
    /// Locality name.
    pub name: String,
    /// Number of linked fact rows.
    pub fires: u64,
}

/// A value on one report line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportValue {
    /// Minutes, rendered with two decimals.
    Average(f64),
    /// A count, rendered as an integer.
    Count(u64),
}

impl ReportValue {
    /// Numeric value for plotting.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Average(v) => v,
            Self::Count(v) => v as f64,
        }
    }
}

impl fmt::Display for ReportValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Average(v) => write!(f, "{v:.2}"),
            Self::Count(v) => write!(f, "{v}"),
        }
    }
}

/// One `"<label>: <value>"` line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    /// Period label or locality name.
    pub label: String,
    /// The value.
    pub value: ReportValue,
}

/// A titled block of report lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSection {
    /// Section heading, without the trailing colon.
    pub title: String,
    /// Lines in order.
    pub entries: Vec<ReportEntry>,
}
