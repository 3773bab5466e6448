#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Fire response store row types and run modes.
//!
//! These types represent the shapes of data as stored in and retrieved from
//! the `DuckDB` store. They are distinct from the normalized ingestion type
//! in `fire_response_source_models`.

use chrono::NaiveDate;
use fire_response_source_models::{BucketKey, NormalizedIncident};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// How the store's tables are prepared at the start of a run.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StoreMode {
    /// Keep existing rows; new rows accumulate.
    #[default]
    Append,
    /// Drop and recreate every table before ingesting.
    Reset,
}

/// A fact row ready for insertion. The store assigns its ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFact {
    /// Source the incident came from (e.g., `"la_fd"`).
    pub source_id: String,
    /// Time-of-day bucket key.
    pub time_key: BucketKey,
    /// Minutes from creation to first unit on scene.
    pub response_minutes: f64,
    /// Calendar date, when known.
    pub occurred_date: Option<NaiveDate>,
}

impl NewFact {
    /// Builds a fact row from a normalized incident.
    #[must_use]
    pub fn from_incident(source_id: &str, incident: &NormalizedIncident) -> Self {
        Self {
            source_id: source_id.to_string(),
            time_key: incident.occurred_at,
            response_minutes: incident.response_minutes,
            occurred_date: incident.occurred_date,
        }
    }
}

/// A fact row as retrieved from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactRow {
    /// Primary key.
    pub id: i64,
    /// Source that provided this incident.
    pub source_id: String,
    /// Stored time-of-day key, rendered as text.
    pub time_key: String,
    /// Minutes since midnight of the incident creation time.
    pub minute_of_day: u16,
    /// Minutes from creation to first unit on scene.
    pub response_minutes: f64,
    /// Calendar date, when known.
    pub occurred_date: Option<NaiveDate>,
}

/// A locality dimension row. Unique on `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalityRow {
    /// Primary key.
    pub id: i64,
    /// Neighborhood, district or borough name.
    pub name: String,
}

/// Ties one fact row to its locality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactLocalityLink {
    /// Fact row ID.
    pub fact_id: i64,
    /// Locality row ID.
    pub locality_id: i64,
}
