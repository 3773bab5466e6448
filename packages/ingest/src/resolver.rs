//! Locality dimension resolution.
//!
//! Each distinct locality name maps to one row in the `localities` table.
//! The store does the check-then-insert as a single conflict-ignoring
//! upsert on the unique `name` column, so two resolvers (or two processes)
//! racing on the same name still end up with one row and one ID. The memo
//! only saves round trips within a run.

use std::collections::BTreeMap;

use duckdb::Connection;
use fire_response_database::{DbError, store};

/// Run-scoped memo of resolved locality IDs.
#[derive(Debug, Default)]
pub struct LocalityResolver {
    ids: BTreeMap<String, i64>,
}

impl LocalityResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the ID for `name`, creating the dimension row on first use.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the upsert or lookup fails.
    pub fn resolve(&mut self, conn: &Connection, name: &str) -> Result<i64, DbError> {
        if let Some(&id) = self.ids.get(name) {
            return Ok(id);
        }

        let id = store::resolve_locality(conn, name)?;
        log::debug!("Resolved locality {name:?} to id {id}");
        self.ids.insert(name.to_string(), id);
        Ok(id)
    }

    /// Forgets every memoized ID.
    ///
    /// Called after a rolled-back batch, whose new dimension rows no longer
    /// exist.
    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Number of memoized names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether nothing has been resolved yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
