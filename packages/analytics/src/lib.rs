#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Read-side aggregates over the fire response store.
//!
//! The `try_*` functions surface query errors. Their infallible
//! counterparts log the error and return an empty result so a missing
//! table or column degrades the report to "no data" instead of aborting
//! the run.

pub mod report;

use duckdb::Connection;
use fire_response_analytics_models::{LocalityCount, PeriodAverage, TimePeriod};
use fire_response_database::{DbError, queries};
use fire_response_source_models::round_hundredths;
use thiserror::Error;

/// Errors that can occur during analytics operations.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Report file could not be read or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Report text is not in the expected format.
    #[error("Report parse error on line {line}: {message}")]
    Parse {
        /// One-based line number.
        line: usize,
        /// Description of what went wrong.
        message: String,
    },
}

/// Mean response minutes per non-empty two-hour period, in period order.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the query fails.
pub fn try_period_averages(
    conn: &Connection,
    source_id: Option<&str>,
) -> Result<Vec<PeriodAverage>, AnalyticsError> {
    queries::period_aggregates(conn, source_id)?
        .into_iter()
        .map(|(index, average, fire_count)| {
            let period = TimePeriod::new(index).ok_or_else(|| DbError::Conversion {
                message: format!("period index {index} out of range"),
            })?;
            Ok(PeriodAverage {
                period,
                average_minutes: round_hundredths(average),
                fire_count,
            })
        })
        .collect()
}

/// Like [`try_period_averages`], but logs failures and returns an empty
/// list.
#[must_use]
pub fn period_averages(conn: &Connection, source_id: Option<&str>) -> Vec<PeriodAverage> {
    try_period_averages(conn, source_id).unwrap_or_else(|e| {
        log::error!("Period average query failed: {e}");
        Vec::new()
    })
}

/// Fire count per locality, ordered by name. Localities with no linked
/// facts are reported with a count of zero.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the query fails.
pub fn try_locality_counts(
    conn: &Connection,
    source_id: Option<&str>,
) -> Result<Vec<LocalityCount>, AnalyticsError> {
    Ok(queries::locality_aggregates(conn, source_id)?
        .into_iter()
        .map(|(name, fires)| LocalityCount { name, fires })
        .collect())
}

/// Like [`try_locality_counts`], but logs failures and returns an empty
/// list.
#[must_use]
pub fn locality_counts(conn: &Connection, source_id: Option<&str>) -> Vec<LocalityCount> {
    try_locality_counts(conn, source_id).unwrap_or_else(|e| {
        log::error!("Locality count query failed: {e}");
        Vec::new()
    })
}
