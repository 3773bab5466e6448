//! Fact and dimension storage in `DuckDB`.
//!
//! The store file lives at `data/fire_data.duckdb` by default. It contains
//! the `fires` fact table, the `localities` dimension table, the
//! `fire_localities` link table and a `_meta` table for the schema version
//! and last-run bookkeeping. IDs come from sequences so the caller gets them
//! back without a `RETURNING` round trip.

use std::path::Path;

use chrono::NaiveDate;
use duckdb::Connection;
use fire_response_database_models::{FactLocalityLink, FactRow, LocalityRow, NewFact, StoreMode};

use crate::DbError;

/// Version of the schema created by [`create_schema`].
pub const SCHEMA_VERSION: &str = "1";

/// Opens (or creates) the store at `path` and prepares its schema for the
/// given mode.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open(path: &Path, mode: StoreMode) -> Result<Connection, DbError> {
    if let Some(parent) = path.parent() {
        crate::paths::ensure_dir(parent)?;
    }

    let conn = Connection::open(path)?;
    create_schema(&conn, mode)?;
    Ok(conn)
}

/// Opens the store at the default path.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open_default(mode: StoreMode) -> Result<Connection, DbError> {
    open(&crate::paths::store_db_path(), mode)
}

/// Opens a throwaway in-memory store.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open_in_memory() -> Result<Connection, DbError> {
    let conn = Connection::open_in_memory()?;
    create_schema(&conn, StoreMode::Reset)?;
    Ok(conn)
}

/// Creates the schema if missing. In [`StoreMode::Reset`] every table and
/// sequence is dropped first.
///
/// # Errors
///
/// Returns [`DbError`] if any DDL statement fails, or if an existing store
/// was created with a different schema version.
pub fn create_schema(conn: &Connection, mode: StoreMode) -> Result<(), DbError> {
    if mode == StoreMode::Reset {
        log::info!("Resetting fire response store");
        conn.execute_batch(
            "DROP TABLE IF EXISTS fire_localities;
             DROP TABLE IF EXISTS fires;
             DROP TABLE IF EXISTS localities;
             DROP TABLE IF EXISTS _meta;
             DROP SEQUENCE IF EXISTS fires_id_seq;
             DROP SEQUENCE IF EXISTS localities_id_seq;",
        )?;
    }

    conn.execute_batch(
        "CREATE SEQUENCE IF NOT EXISTS fires_id_seq START 1;
         CREATE SEQUENCE IF NOT EXISTS localities_id_seq START 1;

         CREATE TABLE IF NOT EXISTS fires (
            id BIGINT PRIMARY KEY,
            source_id TEXT NOT NULL,
            time_key TEXT NOT NULL,
            minute_of_day INTEGER NOT NULL,
            response_minutes DOUBLE NOT NULL,
            occurred_date DATE
         );

         CREATE TABLE IF NOT EXISTS localities (
            id BIGINT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
         );

         CREATE TABLE IF NOT EXISTS fire_localities (
            fire_id BIGINT PRIMARY KEY,
            locality_id BIGINT NOT NULL
         );

         CREATE TABLE IF NOT EXISTS _meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
         );",
    )?;

    match get_meta(conn, "schema_version")? {
        None => set_meta(conn, "schema_version", SCHEMA_VERSION)?,
        Some(version) if version == SCHEMA_VERSION => {}
        Some(version) => {
            return Err(DbError::Conversion {
                message: format!(
                    "store has schema version {version}, expected {SCHEMA_VERSION}; rerun with reset mode"
                ),
            });
        }
    }

    Ok(())
}

/// Runs `f` inside a transaction, committing on success and rolling back on
/// error.
///
/// # Errors
///
/// Returns the error produced by `f`, or [`DbError`] if the transaction
/// cannot be started or committed.
pub fn with_transaction<T, E>(
    conn: &Connection,
    f: impl FnOnce(&Connection) -> Result<T, E>,
) -> Result<T, E>
where
    E: From<DbError>,
{
    conn.execute_batch("BEGIN TRANSACTION")
        .map_err(DbError::from)?;

    match f(conn) {
        Ok(value) => {
            conn.execute_batch("COMMIT").map_err(DbError::from)?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = conn.execute_batch("ROLLBACK") {
                log::error!("Failed to roll back transaction: {rollback_err}");
            }
            Err(e)
        }
    }
}

/// Inserts a batch of fact rows, returning their assigned IDs in input
/// order.
///
/// # Errors
///
/// Returns [`DbError`] if any insert fails.
pub fn insert_fact_batch(conn: &Connection, facts: &[NewFact]) -> Result<Vec<i64>, DbError> {
    if facts.is_empty() {
        return Ok(Vec::new());
    }

    let mut next_id = conn.prepare("SELECT nextval('fires_id_seq')")?;
    let mut insert = conn.prepare(
        "INSERT INTO fires (id, source_id, time_key, minute_of_day, response_minutes, occurred_date)
         VALUES (?, ?, ?, ?, ?, ?)",
    )?;

    let mut ids = Vec::with_capacity(facts.len());

    for fact in facts {
        let id: i64 = next_id.query_row([], |row| row.get(0))?;
        let occurred_date = fact
            .occurred_date
            .map(|d| d.format("%Y-%m-%d").to_string());

        insert.execute(duckdb::params![
            id,
            fact.source_id,
            fact.time_key.to_string(),
            i32::from(fact.time_key.minute_of_day()),
            fact.response_minutes,
            occurred_date,
        ])?;

        ids.push(id);
    }

    Ok(ids)
}

/// Returns the ID of the locality named `name`, creating the row if it
/// does not exist yet.
///
/// The insert is a single `ON CONFLICT DO NOTHING` statement against the
/// unique `name` column followed by a lookup, so two writers resolving the
/// same name can never create two rows.
///
/// # Errors
///
/// Returns [`DbError`] if the upsert or lookup fails.
pub fn resolve_locality(conn: &Connection, name: &str) -> Result<i64, DbError> {
    conn.execute(
        "INSERT INTO localities (id, name)
         VALUES (nextval('localities_id_seq'), ?)
         ON CONFLICT (name) DO NOTHING",
        [name],
    )?;

    let mut stmt = conn.prepare("SELECT id FROM localities WHERE name = ?")?;
    let id: i64 = stmt.query_row([name], |row| row.get(0))?;
    Ok(id)
}

/// Links a fact row to a locality row.
///
/// # Errors
///
/// Returns [`DbError`] if the insert fails (e.g., the fact is already
/// linked).
pub fn link_fact_locality(conn: &Connection, fact_id: i64, locality_id: i64) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO fire_localities (fire_id, locality_id) VALUES (?, ?)",
        duckdb::params![fact_id, locality_id],
    )?;
    Ok(())
}

/// Returns the number of fact rows, optionally for a single source.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn get_fact_count(conn: &Connection, source_id: Option<&str>) -> Result<u64, DbError> {
    let sql = if source_id.is_some() {
        "SELECT COUNT(*) FROM fires WHERE source_id = ?"
    } else {
        "SELECT COUNT(*) FROM fires"
    };
    let mut stmt = conn.prepare(sql)?;
    let count: i64 = stmt.query_row(duckdb::params_from_iter(source_id.iter()), |row| {
        row.get(0)
    })?;
    u64::try_from(count).map_err(|e| DbError::Conversion {
        message: format!("negative row count {count}: {e}"),
    })
}

/// Returns fact rows in insertion order, optionally for a single source.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a stored value is out of
/// range.
pub fn get_fact_rows(conn: &Connection, source_id: Option<&str>) -> Result<Vec<FactRow>, DbError> {
    let sql = format!(
        "SELECT id, source_id, time_key, minute_of_day, response_minutes, occurred_date::TEXT
         FROM fires {}
         ORDER BY id",
        if source_id.is_some() {
            "WHERE source_id = ?"
        } else {
            ""
        }
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(duckdb::params_from_iter(source_id.iter()))?;
    let mut facts = Vec::new();

    while let Some(row) = rows.next()? {
        let minute_of_day: i32 = row.get(3)?;
        let occurred_date: Option<String> = row.get(5)?;

        facts.push(FactRow {
            id: row.get(0)?,
            source_id: row.get(1)?,
            time_key: row.get(2)?,
            minute_of_day: u16::try_from(minute_of_day).map_err(|e| DbError::Conversion {
                message: format!("minute_of_day {minute_of_day} out of range: {e}"),
            })?,
            response_minutes: row.get(4)?,
            occurred_date: occurred_date
                .as_deref()
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()),
        });
    }

    Ok(facts)
}

/// Returns every locality row ordered by ID.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn get_localities(conn: &Connection) -> Result<Vec<LocalityRow>, DbError> {
    let mut stmt = conn.prepare("SELECT id, name FROM localities ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok(LocalityRow {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Returns every fact/locality link ordered by fact ID.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn get_links(conn: &Connection) -> Result<Vec<FactLocalityLink>, DbError> {
    let mut stmt =
        conn.prepare("SELECT fire_id, locality_id FROM fire_localities ORDER BY fire_id")?;
    let rows = stmt.query_map([], |row| {
        Ok(FactLocalityLink {
            fact_id: row.get(0)?,
            locality_id: row.get(1)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Gets a metadata value from the `_meta` table.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>, DbError> {
    let mut stmt = conn.prepare("SELECT value FROM _meta WHERE key = ?")?;
    let result = stmt.query_row([key], |row| row.get(0));
    match result {
        Ok(v) => Ok(Some(v)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(DbError::DuckDb(e)),
    }
}

/// Sets a metadata value in the `_meta` table.
///
/// # Errors
///
/// Returns [`DbError`] if the upsert fails.
pub fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO _meta (key, value) VALUES (?, ?)
         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        duckdb::params![key, value],
    )?;
    Ok(())
}

/// Records bookkeeping for a completed ingestion run.
///
/// # Errors
///
/// Returns [`DbError`] if the metadata update fails.
pub fn record_run(
    conn: &Connection,
    source_id: &str,
    mode: StoreMode,
    inserted: u64,
) -> Result<(), DbError> {
    let now = chrono::Utc::now().to_rfc3339();
    set_meta(conn, "last_run_source", source_id)?;
    set_meta(conn, "last_run_mode", mode.as_ref())?;
    set_meta(conn, "last_run_inserted", &inserted.to_string())?;
    set_meta(conn, "last_run_at", &now)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use fire_response_source_models::BucketKey;

    use super::*;

    fn fact(source_id: &str, hour: u8, minute: u8, response_minutes: f64) -> NewFact {
        NewFact {
            source_id: source_id.to_string(),
            time_key: BucketKey::Clock { hour, minute },
            response_minutes,
            occurred_date: None,
        }
    }

    #[test]
    fn creates_schema_with_version() {
        let conn = open_in_memory().unwrap();
        assert_eq!(
            get_meta(&conn, "schema_version").unwrap().as_deref(),
            Some(SCHEMA_VERSION)
        );
        assert_eq!(get_fact_count(&conn, None).unwrap(), 0);
    }

    #[test]
    fn inserts_facts_with_sequential_ids() {
        let conn = open_in_memory().unwrap();
        let ids = insert_fact_batch(
            &conn,
            &[fact("la_fd", 10, 0, 7.5), fact("la_fd", 10, 15, 5.0)],
        )
        .unwrap();
        assert_eq!(ids, vec![1, 2]);

        let rows = get_fact_rows(&conn, None).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].time_key, "10:00");
        assert_eq!(rows[1].minute_of_day, 615);
        assert!((rows[0].response_minutes - 7.5).abs() < f64::EPSILON);
    }

    #[test]
    fn stores_minute_of_day_keys_and_dates() {
        let conn = open_in_memory().unwrap();
        insert_fact_batch(
            &conn,
            &[NewFact {
                source_id: "nyc_fd".to_string(),
                time_key: BucketKey::MinuteOfDay(1430),
                response_minutes: 4.25,
                occurred_date: NaiveDate::from_ymd_opt(2024, 1, 15),
            }],
        )
        .unwrap();

        let rows = get_fact_rows(&conn, Some("nyc_fd")).unwrap();
        assert_eq!(rows[0].time_key, "1430");
        assert_eq!(rows[0].minute_of_day, 1430);
        assert_eq!(rows[0].occurred_date, NaiveDate::from_ymd_opt(2024, 1, 15));
        assert!(get_fact_rows(&conn, Some("la_fd")).unwrap().is_empty());
    }

    #[test]
    fn resolve_locality_is_idempotent() {
        let conn = open_in_memory().unwrap();
        let first = resolve_locality(&conn, "Harlem").unwrap();
        let second = resolve_locality(&conn, "Harlem").unwrap();
        let other = resolve_locality(&conn, "Astoria").unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(get_localities(&conn).unwrap().len(), 2);
    }

    #[test]
    fn links_are_one_per_fact() {
        let conn = open_in_memory().unwrap();
        let ids = insert_fact_batch(&conn, &[fact("la_fd", 1, 0, 3.0)]).unwrap();
        let locality = resolve_locality(&conn, "A").unwrap();

        link_fact_locality(&conn, ids[0], locality).unwrap();
        assert!(link_fact_locality(&conn, ids[0], locality).is_err());

        assert_eq!(
            get_links(&conn).unwrap(),
            vec![FactLocalityLink {
                fact_id: ids[0],
                locality_id: locality
            }]
        );
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let conn = open_in_memory().unwrap();
        let result: Result<(), DbError> = with_transaction(&conn, |conn| {
            insert_fact_batch(conn, &[fact("la_fd", 2, 0, 1.0)])?;
            Err(DbError::Conversion {
                message: "boom".to_string(),
            })
        });

        assert!(result.is_err());
        assert_eq!(get_fact_count(&conn, None).unwrap(), 0);
    }

    #[test]
    fn transaction_commits_on_success() {
        let conn = open_in_memory().unwrap();
        let ids = with_transaction(&conn, |conn| {
            insert_fact_batch(conn, &[fact("la_fd", 2, 0, 1.0)])
        })
        .unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(get_fact_count(&conn, Some("la_fd")).unwrap(), 1);
    }

    #[test]
    fn append_mode_keeps_rows_and_reset_clears_them() {
        let conn = open_in_memory().unwrap();
        insert_fact_batch(&conn, &[fact("la_fd", 2, 0, 1.0)]).unwrap();
        resolve_locality(&conn, "A").unwrap();

        create_schema(&conn, StoreMode::Append).unwrap();
        assert_eq!(get_fact_count(&conn, None).unwrap(), 1);

        create_schema(&conn, StoreMode::Reset).unwrap();
        assert_eq!(get_fact_count(&conn, None).unwrap(), 0);
        assert!(get_localities(&conn).unwrap().is_empty());

        let ids = insert_fact_batch(&conn, &[fact("la_fd", 3, 0, 1.0)]).unwrap();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn records_run_metadata() {
        let conn = open_in_memory().unwrap();
        record_run(&conn, "nyc_fd", StoreMode::Reset, 42).unwrap();
        assert_eq!(
            get_meta(&conn, "last_run_source").unwrap().as_deref(),
            Some("nyc_fd")
        );
        assert_eq!(
            get_meta(&conn, "last_run_mode").unwrap().as_deref(),
            Some("reset")
        );
        assert_eq!(
            get_meta(&conn, "last_run_inserted").unwrap().as_deref(),
            Some("42")
        );
    }

    #[test]
    fn rejects_mismatched_schema_version() {
        let conn = open_in_memory().unwrap();
        set_meta(&conn, "schema_version", "0").unwrap();
        assert!(matches!(
            create_schema(&conn, StoreMode::Append),
            Err(DbError::Conversion { .. })
        ));
        create_schema(&conn, StoreMode::Reset).unwrap();
    }
}
