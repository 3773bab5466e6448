#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Ingestion run configuration and result types.

use std::time::Duration;

use fire_response_database_models::StoreMode;
use serde::{Deserialize, Serialize};

/// Default cap on accepted fact rows per run.
pub const DEFAULT_MAX_ROWS: u64 = 100;

/// Default number of fact rows committed per transaction.
pub const DEFAULT_BATCH_SIZE: usize = 25;

/// Per-run ingestion settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IngestConfig {
    /// Maximum number of fact rows created in one run.
    pub max_rows: u64,
    /// Number of fact rows per committed batch. Must be non-zero.
    pub batch_size: usize,
    /// Whether the store is appended to or reset before ingesting.
    pub mode: StoreMode,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_rows: DEFAULT_MAX_ROWS,
            batch_size: DEFAULT_BATCH_SIZE,
            mode: StoreMode::default(),
        }
    }
}

impl IngestConfig {
    /// Checks that the settings are usable.
    ///
    /// # Errors
    ///
    /// Returns a message describing the invalid setting.
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("batch_size must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Result of one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestSummary {
    /// Source the records came from.
    pub source_id: String,
    /// Raw records pulled from the input sequence.
    pub records_seen: u64,
    /// Fact rows persisted.
    pub accepted: u64,
    /// Records the normalizer rejected.
    pub skipped: u64,
    /// Transactions committed.
    pub batches_committed: u64,
    /// Whether the run stopped because `max_rows` was reached.
    pub capped: bool,
    /// How long the run took.
    pub duration: Duration,
}
