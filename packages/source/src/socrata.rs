//! Socrata SODA API fetcher.
//!
//! Handles paginated fetching from any Socrata dataset using the `$limit`,
//! `$offset`, `$order`, and `$where` query parameters. Used by both the LA
//! and NYC feeds.

use crate::source_def::{FetcherConfig, SourceDefinition};
use crate::{FetchOptions, SourceError};

/// Configuration for a Socrata fetch operation.
pub struct SocrataConfig<'a> {
    /// Base API URL (e.g., `"https://data.lacity.org/resource/n44u-wxe4.json"`).
    pub api_url: &'a str,
    /// Column used for `$order` so offsets stay stable between pages.
    pub order_column: &'a str,
    /// Optional `$where` filter.
    pub where_clause: Option<&'a str>,
    /// Label for log messages (e.g., `"Los Angeles Fire Department"`).
    pub label: &'a str,
    /// Page size for pagination.
    pub page_size: u64,
}

/// Builds the query parameters for one page.
fn page_params(config: &SocrataConfig<'_>, limit: u64, offset: u64) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("$limit", limit.to_string()),
        ("$offset", offset.to_string()),
        ("$order", config.order_column.to_string()),
    ];
    if let Some(where_clause) = config.where_clause {
        params.push(("$where", where_clause.to_string()));
    }
    params
}

/// Fetches records from a Socrata dataset with pagination.
///
/// Stops on a short page or once `options.limit` records have been
/// fetched.
///
/// # Errors
///
/// Returns [`SourceError`] if an HTTP request fails, the server returns an
/// error status, or a page body is not a JSON array.
pub async fn fetch_socrata(
    config: &SocrataConfig<'_>,
    options: &FetchOptions,
) -> Result<Vec<serde_json::Value>, SourceError> {
    let client = reqwest::Client::new();
    let mut all_records: Vec<serde_json::Value> = Vec::new();
    let fetch_limit = options.limit.unwrap_or(u64::MAX);
    let mut fetched: u64 = 0;

    loop {
        let remaining = fetch_limit.saturating_sub(fetched);
        if remaining == 0 {
            break;
        }
        let page_limit = remaining.min(config.page_size);
        let offset = options.offset + fetched;

        log::info!(
            "Fetching {} data: offset={offset}, limit={page_limit}",
            config.label
        );
        let response = client
            .get(config.api_url)
            .query(&page_params(config, page_limit, offset))
            .send()
            .await?
            .error_for_status()?;
        let records: Vec<serde_json::Value> = response.json().await?;

        let count = records.len() as u64;
        if count == 0 {
            break;
        }

        all_records.extend(records);
        fetched += count;

        if count < page_limit {
            break;
        }
    }

    log::info!(
        "Downloaded {} {} records total",
        all_records.len(),
        config.label
    );

    Ok(all_records)
}

/// Fetches raw records for a source according to its fetcher config.
///
/// # Errors
///
/// Returns [`SourceError`] if fetching fails.
pub async fn fetch_source(
    source: &SourceDefinition,
    options: &FetchOptions,
) -> Result<Vec<serde_json::Value>, SourceError> {
    match &source.fetcher {
        FetcherConfig::Socrata {
            api_url,
            order_column,
            where_clause,
            page_size,
        } => {
            fetch_socrata(
                &SocrataConfig {
                    api_url,
                    order_column,
                    where_clause: where_clause.as_deref(),
                    label: source.name(),
                    page_size: *page_size,
                },
                options,
            )
            .await
        }
    }
}
