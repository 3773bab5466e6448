#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Fire incident feed definitions and record normalization.
//!
//! Each city feed is described by a TOML [`source_def::SourceDefinition`]
//! that says where to fetch raw records and how to map their fields. The
//! [`normalize`] module turns one raw record into a
//! [`fire_response_source_models::NormalizedIncident`] without any I/O.
//! Fetching ([`socrata`]) and the on-disk raw record cache ([`cache`]) are
//! collaborators of the ingestor, not part of it.

pub mod cache;
pub mod normalize;
pub mod parsing;
pub mod registry;
pub mod socrata;
pub mod source_def;

/// Errors that can occur during data source operations.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Source definition could not be parsed.
    #[error("Invalid source definition: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },
}

/// Configuration for fetching data from a source.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Maximum number of raw records to fetch. `None` fetches everything.
    pub limit: Option<u64>,
    /// Number of records to skip before the first page.
    pub offset: u64,
}
