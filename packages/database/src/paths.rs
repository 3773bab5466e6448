#![allow(clippy::module_name_repetitions)]
//! Canonical file paths for the data directory.
//!
//! The data root defaults to the workspace's `data/` directory and can be
//! overridden with the `FIRE_RESPONSE_DATA_DIR` environment variable.

use std::path::{Path, PathBuf};

/// Environment variable overriding the data root.
pub const DATA_DIR_ENV: &str = "FIRE_RESPONSE_DATA_DIR";

/// Returns the workspace root directory.
///
/// Resolved at compile time from `CARGO_MANIFEST_DIR`. Falls back to the
/// current directory if the manifest directory is not nested as expected.
#[must_use]
pub fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Returns the data root directory.
#[must_use]
pub fn data_dir() -> PathBuf {
    std::env::var_os(DATA_DIR_ENV).map_or_else(|| project_root().join("data"), PathBuf::from)
}

/// Returns the `DuckDB` store file path.
#[must_use]
pub fn store_db_path() -> PathBuf {
    data_dir().join("fire_data.duckdb")
}

/// Returns the directory holding raw feed caches.
#[must_use]
pub fn cache_dir() -> PathBuf {
    data_dir().join("cache")
}

/// Returns the raw cache path for a feed's cache file name.
#[must_use]
pub fn cache_path(output_filename: &str) -> PathBuf {
    cache_dir().join(output_filename)
}

/// Returns the default report file path.
#[must_use]
pub fn report_path() -> PathBuf {
    data_dir().join("calculations.txt")
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
