#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Library for ingesting fire incident records into the `DuckDB` store.
//!
//! [`ingest_records`] drains any iterator of raw records through the
//! normalizer and writes at most `max_rows` fact rows, committing every
//! `batch_size` rows. [`sync_source`] wires it to the fetcher and the raw
//! record cache.

pub mod resolver;

use std::time::Instant;

use duckdb::Connection;
use fire_response_database::{DbError, paths, store};
use fire_response_database_models::NewFact;
use fire_response_ingest_models::{IngestConfig, IngestSummary};
use fire_response_source::cache::RawCache;
use fire_response_source::normalize::normalize_record;
use fire_response_source::source_def::{FieldMapping, SourceDefinition};
use fire_response_source::{FetchOptions, SourceError, socrata};
use fire_response_source_models::NormalizedIncident;

use crate::resolver::LocalityResolver;

/// Environment variable holding a comma-separated source filter.
pub const SOURCES_ENV: &str = "FIRE_RESPONSE_SOURCES";

/// Errors that can abort an ingestion run.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Store write or schema error.
    #[error(transparent)]
    Db(#[from] DbError),

    /// Fetching or caching raw records failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The run configuration is unusable.
    #[error("Invalid ingest configuration: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },
}

/// Returns all configured data sources from the TOML registry.
#[must_use]
pub fn all_sources() -> Vec<SourceDefinition> {
    fire_response_source::registry::all_sources()
}

/// Returns the sources to sync, filtered by the `--sources` CLI flag or the
/// `FIRE_RESPONSE_SOURCES` environment variable. If neither is set, all
/// sources are returned.
#[must_use]
pub fn enabled_sources(cli_filter: Option<String>) -> Vec<SourceDefinition> {
    let filter = cli_filter.or_else(|| std::env::var(SOURCES_ENV).ok());
    filter_sources(all_sources(), filter.as_deref())
}

fn filter_sources(all: Vec<SourceDefinition>, filter: Option<&str>) -> Vec<SourceDefinition> {
    let Some(filter_str) = filter else {
        return all;
    };

    let ids: Vec<&str> = filter_str.split(',').map(str::trim).collect();
    let available = all
        .iter()
        .map(|s| s.id().to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let filtered: Vec<SourceDefinition> =
        all.into_iter().filter(|s| ids.contains(&s.id())).collect();

    if filtered.is_empty() {
        log::warn!("No matching sources found for filter {ids:?}. Available: {available}");
    }

    filtered
}

/// Normalizes and stores raw records until the input runs out or
/// `config.max_rows` fact rows have been accepted.
///
/// Records are pulled lazily and in order. Accepted incidents are written
/// in transactions of `config.batch_size` rows; each transaction inserts the
/// fact rows, resolves their localities and links them. Once the cap is
/// reached the partial batch is committed and no further records are
/// pulled. Records the normalizer rejects are logged and do not count
/// toward the cap.
///
/// # Errors
///
/// Returns [`IngestError::Config`] if `config` is invalid, or
/// [`IngestError::Db`] if a batch cannot be written. Batches committed
/// before the failure stay in the store; the failed batch is rolled back.
pub fn ingest_records<I>(
    conn: &Connection,
    source_id: &str,
    fields: &FieldMapping,
    records: I,
    config: &IngestConfig,
) -> Result<IngestSummary, IngestError>
where
    I: IntoIterator<Item = serde_json::Value>,
{
    config
        .validate()
        .map_err(|message| IngestError::Config { message })?;

    let start = Instant::now();
    let mut resolver = LocalityResolver::new();
    let mut batch: Vec<NormalizedIncident> = Vec::with_capacity(config.batch_size);
    let mut records_seen: u64 = 0;
    let mut accepted: u64 = 0;
    let mut skipped: u64 = 0;
    let mut batches_committed: u64 = 0;
    let mut capped = config.max_rows == 0;

    if !capped {
        for record in records {
            records_seen += 1;

            let Some(incident) = normalize_record(&record, fields) else {
                skipped += 1;
                continue;
            };

            batch.push(incident);
            accepted += 1;

            if accepted >= config.max_rows {
                capped = true;
                break;
            }

            if batch.len() >= config.batch_size {
                batches_committed += 1;
                commit_batch(conn, source_id, &batch, &mut resolver, batches_committed)?;
                batch.clear();
            }
        }
    }

    if !batch.is_empty() {
        batches_committed += 1;
        commit_batch(conn, source_id, &batch, &mut resolver, batches_committed)?;
    }

    let summary = IngestSummary {
        source_id: source_id.to_string(),
        records_seen,
        accepted,
        skipped,
        batches_committed,
        capped,
        duration: start.elapsed(),
    };

    log::info!(
        "Ingest complete for {source_id}: {accepted} stored, {skipped} skipped from {records_seen} records in {batches_committed} batch(es){}",
        if capped { " (row cap reached)" } else { "" }
    );

    Ok(summary)
}

fn commit_batch(
    conn: &Connection,
    source_id: &str,
    batch: &[NormalizedIncident],
    resolver: &mut LocalityResolver,
    batch_num: u64,
) -> Result<(), IngestError> {
    let facts: Vec<NewFact> = batch
        .iter()
        .map(|incident| NewFact::from_incident(source_id, incident))
        .collect();

    let result = store::with_transaction(conn, |conn| -> Result<(), DbError> {
        let ids = store::insert_fact_batch(conn, &facts)?;
        for (fact_id, incident) in ids.into_iter().zip(batch) {
            let locality_id = resolver.resolve(conn, &incident.locality)?;
            store::link_fact_locality(conn, fact_id, locality_id)?;
        }
        Ok(())
    });

    if let Err(e) = result {
        log::error!("{source_id}: batch {batch_num} rolled back: {e}");
        resolver.clear();
        return Err(e.into());
    }

    log::info!(
        "{source_id}: batch {batch_num} committed {} rows",
        facts.len()
    );
    Ok(())
}

/// Fetches (unless `fetch` is `None`), caches and ingests one source.
///
/// Fetched pages are appended to the source's raw cache, and the whole
/// cache is then fed to [`ingest_records`]. The run is recorded in the
/// store's metadata.
///
/// # Errors
///
/// Returns [`IngestError`] if fetching, caching or storing fails.
pub async fn sync_source(
    conn: &Connection,
    source: &SourceDefinition,
    config: &IngestConfig,
    fetch: Option<&FetchOptions>,
) -> Result<IngestSummary, IngestError> {
    log::info!("Syncing source: {} ({})", source.name(), source.id());

    let cache = RawCache::new(paths::cache_path(&source.output_filename));

    if let Some(options) = fetch {
        let records = socrata::fetch_source(source, options).await?;
        cache.append(records)?;
    } else {
        log::info!(
            "{}: offline, reading {}",
            source.name(),
            cache.path().display()
        );
    }

    let summary = ingest_records(conn, source.id(), &source.fields, cache.load(), config)?;
    store::record_run(conn, source.id(), config.mode, summary.accepted)?;

    log::info!(
        "Sync complete for {}: {} stored, took {:.1}s",
        source.name(),
        summary.accepted,
        summary.duration.as_secs_f64()
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use fire_response_analytics::{try_locality_counts, try_period_averages};
    use fire_response_source::registry::find_source;
    use serde_json::json;

    use super::*;

    fn la_fields() -> FieldMapping {
        find_source("la_fd").unwrap().fields
    }

    fn la_record(created: &str, on_scene: &str, locality: &str) -> serde_json::Value {
        json!({
            "incident_creation_time_gmt": created,
            "on_scene_time_gmt": on_scene,
            "first_in_district": locality,
        })
    }

    fn scenario_records() -> Vec<serde_json::Value> {
        vec![
            la_record("10:00:00.0", "10:07:30.0", "A"),
            la_record("10:15:00.0", "10:20:00.0", "A"),
            la_record("23:50:00.0", "23:55:00.0", "B"),
        ]
    }

    fn config(max_rows: u64, batch_size: usize) -> IngestConfig {
        IngestConfig {
            max_rows,
            batch_size,
            ..IngestConfig::default()
        }
    }

    fn response_minutes(conn: &Connection) -> Vec<f64> {
        store::get_fact_rows(conn, None)
            .unwrap()
            .into_iter()
            .map(|row| row.response_minutes)
            .collect()
    }

    #[test]
    fn three_record_scenario() {
        let conn = store::open_in_memory().unwrap();
        let summary =
            ingest_records(&conn, "la_fd", &la_fields(), scenario_records(), &config(10, 25))
                .unwrap();

        assert_eq!(summary.accepted, 3);
        assert_eq!(summary.batches_committed, 1);
        assert!(!summary.capped);
        assert_eq!(response_minutes(&conn), vec![7.5, 5.0, 5.0]);

        let periods = try_period_averages(&conn, None).unwrap();
        let labels: Vec<(String, f64)> = periods
            .iter()
            .map(|p| (p.period.label(), p.average_minutes))
            .collect();
        assert_eq!(
            labels,
            vec![
                ("10:00 - 11:59".to_string(), 6.25),
                ("22:00 - 23:59".to_string(), 5.0),
            ]
        );

        let counts: Vec<(String, u64)> = try_locality_counts(&conn, None)
            .unwrap()
            .into_iter()
            .map(|c| (c.name, c.fires))
            .collect();
        assert_eq!(
            counts,
            vec![("A".to_string(), 2), ("B".to_string(), 1)]
        );
    }

    #[test]
    fn skipped_record_does_not_count() {
        let conn = store::open_in_memory().unwrap();
        let records = vec![
            json!({
                "incident_creation_time_gmt": "09:00:00.0",
                "first_in_district": "C",
            }),
            la_record("10:00:00.0", "10:07:30.0", "A"),
            la_record("10:15:00.0", "10:20:00.0", "A"),
        ];

        let summary =
            ingest_records(&conn, "la_fd", &la_fields(), records, &config(2, 25)).unwrap();

        assert_eq!(summary.records_seen, 3);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.accepted, 2);
        assert_eq!(response_minutes(&conn), vec![7.5, 5.0]);

        let counts = try_locality_counts(&conn, None).unwrap();
        assert!(counts.iter().all(|c| c.name != "C"));
        let periods = try_period_averages(&conn, None).unwrap();
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].fire_count, 2);
    }

    #[test]
    fn cap_of_one_stops_after_first_row() {
        let conn = store::open_in_memory().unwrap();
        let mut pulled = 0;
        let records = scenario_records().into_iter().inspect(|_| pulled += 1);

        let summary = ingest_records(&conn, "la_fd", &la_fields(), records, &config(1, 25)).unwrap();

        assert_eq!(pulled, 1);
        assert!(summary.capped);
        assert_eq!(store::get_fact_count(&conn, None).unwrap(), 1);
        assert_eq!(response_minutes(&conn), vec![7.5]);
    }

    #[test]
    fn stops_mid_batch_at_cap() {
        let conn = store::open_in_memory().unwrap();
        let records: Vec<serde_json::Value> = (0..10)
            .map(|i| la_record(&format!("0{i}:00:00.0"), &format!("0{i}:03:00.0"), "A"))
            .collect();

        let summary = ingest_records(&conn, "la_fd", &la_fields(), records, &config(5, 2)).unwrap();

        assert_eq!(summary.accepted, 5);
        assert_eq!(summary.records_seen, 5);
        assert_eq!(summary.batches_committed, 3);
        assert_eq!(store::get_fact_count(&conn, None).unwrap(), 5);
    }

    #[test]
    fn preserves_input_order() {
        let conn = store::open_in_memory().unwrap();
        let records = vec![
            la_record("23:50:00.0", "23:55:00.0", "B"),
            la_record("10:00:00.0", "10:07:30.0", "A"),
        ];

        ingest_records(&conn, "la_fd", &la_fields(), records, &config(10, 1)).unwrap();

        let keys: Vec<String> = store::get_fact_rows(&conn, None)
            .unwrap()
            .into_iter()
            .map(|row| row.time_key)
            .collect();
        assert_eq!(keys, vec!["23:50".to_string(), "10:00".to_string()]);
    }

    #[test]
    fn every_fact_gets_one_link() {
        let conn = store::open_in_memory().unwrap();
        ingest_records(&conn, "la_fd", &la_fields(), scenario_records(), &config(10, 2)).unwrap();

        let facts = store::get_fact_rows(&conn, None).unwrap();
        let links = store::get_links(&conn).unwrap();
        assert_eq!(links.len(), facts.len());
        assert_eq!(store::get_localities(&conn).unwrap().len(), 2);
        assert_eq!(links[0].locality_id, links[1].locality_id);
        assert_ne!(links[0].locality_id, links[2].locality_id);
    }

    #[test]
    fn zero_cap_ingests_nothing() {
        let conn = store::open_in_memory().unwrap();
        let summary =
            ingest_records(&conn, "la_fd", &la_fields(), scenario_records(), &config(0, 25))
                .unwrap();

        assert_eq!(summary.records_seen, 0);
        assert!(summary.capped);
        assert_eq!(store::get_fact_count(&conn, None).unwrap(), 0);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let conn = store::open_in_memory().unwrap();
        let result = ingest_records(&conn, "la_fd", &la_fields(), scenario_records(), &config(10, 0));
        assert!(matches!(result, Err(IngestError::Config { .. })));
    }

    #[test]
    fn write_failure_aborts_and_keeps_committed_batches() {
        let conn = store::open_in_memory().unwrap();
        ingest_records(&conn, "la_fd", &la_fields(), scenario_records(), &config(10, 25)).unwrap();

        conn.execute_batch("DROP TABLE fire_localities").unwrap();
        let result =
            ingest_records(&conn, "la_fd", &la_fields(), scenario_records(), &config(10, 25));

        assert!(matches!(result, Err(IngestError::Db(_))));
        assert_eq!(store::get_fact_count(&conn, None).unwrap(), 3);
    }

    #[test]
    fn append_accumulates_and_reset_starts_over() {
        let conn = store::open_in_memory().unwrap();
        ingest_records(&conn, "la_fd", &la_fields(), scenario_records(), &config(10, 25)).unwrap();
        ingest_records(&conn, "la_fd", &la_fields(), scenario_records(), &config(10, 25)).unwrap();

        assert_eq!(store::get_fact_count(&conn, None).unwrap(), 6);
        assert_eq!(store::get_localities(&conn).unwrap().len(), 2);

        store::create_schema(&conn, fire_response_database_models::StoreMode::Reset).unwrap();
        ingest_records(&conn, "la_fd", &la_fields(), scenario_records(), &config(10, 25)).unwrap();
        assert_eq!(store::get_fact_count(&conn, None).unwrap(), 3);
    }

    #[test]
    fn filters_sources_by_id() {
        let filtered = filter_sources(all_sources(), Some("nyc_fd, missing"));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id(), "nyc_fd");

        assert_eq!(filter_sources(all_sources(), None).len(), all_sources().len());
        assert!(filter_sources(all_sources(), Some("nope")).is_empty());
    }
}
