//! On-disk cache of raw feed records.
//!
//! Each feed keeps a single flat JSON array of raw records. Fetched pages
//! are appended to it and the ingestor reads it back as a plain sequence of
//! records. The cache never normalizes or deduplicates anything.

use std::path::{Path, PathBuf};

use crate::SourceError;

/// A JSON array file of raw records for one feed.
#[derive(Debug, Clone)]
pub struct RawCache {
    path: PathBuf,
}

impl RawCache {
    /// Creates a cache backed by the given file. Nothing is touched on disk
    /// until [`Self::append`] is called.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads every cached record.
    ///
    /// A missing file, an unreadable file, or a file that is not a JSON
    /// array all yield an empty list.
    #[must_use]
    pub fn load(&self) -> Vec<serde_json::Value> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No raw cache at {}", self.path.display());
                return Vec::new();
            }
            Err(e) => {
                log::warn!("Failed to read raw cache {}: {e}", self.path.display());
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<serde_json::Value>>(&data) {
            Ok(records) => records,
            Err(e) => {
                log::warn!(
                    "Raw cache {} is not a JSON array, ignoring it: {e}",
                    self.path.display()
                );
                Vec::new()
            }
        }
    }

    /// Appends records to the cache, returning the new total.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the directory cannot be created or the
    /// file cannot be written.
    pub fn append(&self, records: Vec<serde_json::Value>) -> Result<usize, SourceError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut existing = self.load();
        existing.extend(records);

        let json = serde_json::to_string_pretty(&existing)?;
        std::fs::write(&self.path, json)?;

        log::info!(
            "Raw cache {} now holds {} records",
            self.path.display(),
            existing.len()
        );
        Ok(existing.len())
    }

    /// Deletes the backing file if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<(), SourceError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_cache() -> RawCache {
        let dir = std::env::temp_dir().join(format!("fire_response_cache_{}", uuid::Uuid::new_v4()));
        RawCache::new(dir.join("LA_data.json"))
    }

    #[test]
    fn missing_file_loads_empty() {
        let cache = temp_cache();
        assert!(cache.load().is_empty());
    }

    #[test]
    fn append_extends_flat_array() {
        let cache = temp_cache();
        cache
            .append(vec![serde_json::json!({"a": 1}), serde_json::json!({"a": 2})])
            .unwrap();
        let total = cache.append(vec![serde_json::json!({"a": 3})]).unwrap();
        assert_eq!(total, 3);

        let records = cache.load();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(serde_json::Value::is_object));
        assert_eq!(records[2]["a"], 3);

        cache.clear().unwrap();
        assert!(cache.load().is_empty());
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let cache = temp_cache();
        std::fs::create_dir_all(cache.path().parent().unwrap()).unwrap();
        std::fs::write(cache.path(), "{not json").unwrap();
        assert!(cache.load().is_empty());
        cache.clear().unwrap();
    }
}
