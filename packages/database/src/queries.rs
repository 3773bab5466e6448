//! Read-side aggregate queries over the fact and dimension tables.
//!
//! Rounding and labelling happen in the analytics layer; these functions
//! return raw database values.

use duckdb::Connection;

use crate::DbError;

/// Width of one time-of-day bucket in minutes.
pub const PERIOD_MINUTES: u16 = 120;

/// `(period_index, mean_response_minutes, fire_count)` for one non-empty
/// two-hour bucket.
pub type PeriodAggregate = (u8, f64, u64);

/// `(locality_name, fire_count)` for one locality.
pub type LocalityAggregate = (String, u64);

fn to_count(value: i64) -> Result<u64, DbError> {
    u64::try_from(value).map_err(|e| DbError::Conversion {
        message: format!("negative count {value}: {e}"),
    })
}

/// Averages response minutes per two-hour bucket of the day.
///
/// Buckets with no facts are absent. Results are ordered by bucket index.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or returns an out-of-range
/// bucket index.
pub fn period_aggregates(
    conn: &Connection,
    source_id: Option<&str>,
) -> Result<Vec<PeriodAggregate>, DbError> {
    let sql = format!(
        "SELECT CAST(FLOOR(minute_of_day / {PERIOD_MINUTES}) AS INTEGER) AS period,
                AVG(response_minutes),
                COUNT(*)
         FROM fires
         {}
         GROUP BY period
         ORDER BY period",
        if source_id.is_some() {
            "WHERE source_id = ?"
        } else {
            ""
        }
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(duckdb::params_from_iter(source_id.iter()))?;
    let mut results = Vec::new();

    while let Some(row) = rows.next()? {
        let period: i32 = row.get(0)?;
        let average: f64 = row.get(1)?;
        let count: i64 = row.get(2)?;

        let period = u8::try_from(period).map_err(|e| DbError::Conversion {
            message: format!("period index {period} out of range: {e}"),
        })?;
        results.push((period, average, to_count(count)?));
    }

    log::debug!("Period aggregate returned {} buckets", results.len());
    Ok(results)
}

/// Counts fact rows per locality.
///
/// Every locality in the dimension table appears, including those with no
/// linked facts. With `source_id` set, only that source's facts are
/// counted.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn locality_aggregates(
    conn: &Connection,
    source_id: Option<&str>,
) -> Result<Vec<LocalityAggregate>, DbError> {
    let sql = format!(
        "SELECT l.name, COUNT(f.id)
         FROM localities l
         LEFT JOIN fire_localities fl ON fl.locality_id = l.id
         LEFT JOIN fires f ON f.id = fl.fire_id {}
         GROUP BY l.name
         ORDER BY l.name",
        if source_id.is_some() {
            "AND f.source_id = ?"
        } else {
            ""
        }
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(duckdb::params_from_iter(source_id.iter()))?;
    let mut results = Vec::new();

    while let Some(row) = rows.next()? {
        let name: String = row.get(0)?;
        let count: i64 = row.get(1)?;
        results.push((name, to_count(count)?));
    }

    Ok(results)
}
