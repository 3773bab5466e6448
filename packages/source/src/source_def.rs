//! Config-driven fire incident feed definition.
//!
//! [`SourceDefinition`] captures everything unique about a city feed in a
//! serializable config struct: where the raw records come from and which
//! fields hold the creation time, on-scene time and locality. A single
//! generic normalizer handles every feed.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use fire_response_source_models::{BucketKeyFormat, NegativeResponsePolicy};
use serde::Deserialize;

use crate::SourceError;
use crate::parsing::parse_socrata_date;

// ── Top-level source definition ──────────────────────────────────────────

/// A complete, config-driven fire incident feed definition.
///
/// Loaded from TOML files embedded at compile time.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceDefinition {
    /// Unique identifier (e.g., `"la_fd"`).
    pub id: String,
    /// Human-readable name (e.g., `"Los Angeles Fire Department"`).
    pub name: String,
    /// City the feed covers.
    pub city: String,
    /// Two-letter state abbreviation.
    pub state: String,
    /// File name of the raw record cache for this feed.
    pub output_filename: String,
    /// How to fetch raw data from the API.
    pub fetcher: FetcherConfig,
    /// Field name mappings for normalization.
    pub fields: FieldMapping,
    /// Optional URL to the human-readable data portal page for this source.
    #[serde(default)]
    pub portal_url: Option<String>,
}

// ── Fetcher config ───────────────────────────────────────────────────────

/// How to fetch raw data from the source API.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FetcherConfig {
    /// Socrata SODA API (`$limit/$offset/$order/$where`).
    Socrata {
        /// Base Socrata API URL.
        api_url: String,
        /// Column to order pages by so offsets are stable.
        order_column: String,
        /// Optional `$where` filter.
        where_clause: Option<String>,
        /// Records per page.
        page_size: u64,
    },
}

impl FetcherConfig {
    /// Derives the human-readable portal URL from the API URL.
    ///
    /// `/resource/{id}.json` becomes `/d/{id}`.
    #[must_use]
    fn derive_portal_url(&self) -> Option<String> {
        match self {
            Self::Socrata { api_url, .. } => api_url.find("/resource/").map(|idx| {
                let base = &api_url[..idx];
                let rest = &api_url[idx + "/resource/".len()..];
                let dataset_id = rest.strip_suffix(".json").unwrap_or(rest);
                format!("{base}/d/{dataset_id}")
            }),
        }
    }
}

// ── Field mapping ────────────────────────────────────────────────────────

/// Maps feed-specific JSON field names to canonical incident fields.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldMapping {
    /// JSON field names for the incident ID, tried in order. Only used to
    /// give skipped-record log lines some context.
    #[serde(default)]
    pub incident_id: Vec<String>,
    /// Field holding the time the incident was created.
    pub created_at: String,
    /// Field holding the time the first unit arrived on scene.
    pub on_scene_at: String,
    /// Field holding the neighborhood, district or borough.
    pub locality: String,
    /// Optional field holding the calendar date of the incident.
    #[serde(default)]
    pub date: Option<String>,
    /// How `created_at` and `on_scene_at` are formatted.
    pub timestamp: TimestampFormat,
    /// Representation of the stored time-of-day bucket key.
    #[serde(default)]
    pub bucket_key: BucketKeyFormat,
    /// What to do with on-scene times earlier than creation times.
    #[serde(default)]
    pub negative_response: NegativeResponsePolicy,
}

/// How the two timestamp fields of a raw record are formatted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimestampFormat {
    /// Wall-clock time only (e.g., `"10:07:30.0"` with `"%H:%M:%S%.f"`).
    TimeOfDay {
        /// `chrono` format string.
        format: String,
    },
    /// Full date and time (e.g., `"2024-01-15T10:07:30.000"`).
    DateTime {
        /// `chrono` format string.
        format: String,
    },
}

/// A parsed creation or on-scene timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedTimestamp {
    /// Time of day without a date.
    Time(NaiveTime),
    /// Date and time.
    DateTime(NaiveDateTime),
}

impl ParsedTimestamp {
    /// The wall-clock part of the timestamp.
    #[must_use]
    pub fn time(&self) -> NaiveTime {
        match self {
            Self::Time(time) => *time,
            Self::DateTime(dt) => dt.time(),
        }
    }

    /// The calendar date, if the timestamp carries one.
    #[must_use]
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Self::Time(_) => None,
            Self::DateTime(dt) => Some(dt.date()),
        }
    }
}

impl TimestampFormat {
    /// Parses a raw timestamp string under this format.
    #[must_use]
    pub fn parse(&self, s: &str) -> Option<ParsedTimestamp> {
        match self {
            Self::TimeOfDay { format } => NaiveTime::parse_from_str(s.trim(), format)
                .ok()
                .map(ParsedTimestamp::Time),
            Self::DateTime { format } => NaiveDateTime::parse_from_str(s.trim(), format)
                .ok()
                .map(ParsedTimestamp::DateTime),
        }
    }

    /// Returns the `chrono` format string.
    #[must_use]
    pub fn format_str(&self) -> &str {
        match self {
            Self::TimeOfDay { format } | Self::DateTime { format } => format,
        }
    }
}

impl FieldMapping {
    /// Extracts the calendar date from the configured date field.
    #[must_use]
    pub fn extract_date(&self, record: &serde_json::Value) -> Option<NaiveDate> {
        let field = self.date.as_deref()?;
        let s = get_str(record, field)?;
        parse_socrata_date(s)
            .map(|dt| dt.date_naive())
            .or_else(|| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
    }
}

/// Gets a string value from a JSON object by field name.
pub(crate) fn get_str<'a>(record: &'a serde_json::Value, field: &str) -> Option<&'a str> {
    record.get(field)?.as_str()
}

/// Tries each field name in order and returns the first non-empty string
/// value. Falls back to converting numeric values to strings.
pub(crate) fn extract_incident_id(record: &serde_json::Value, fields: &[String]) -> Option<String> {
    for field in fields {
        if let Some(s) = get_str(record, field)
            && !s.is_empty()
        {
            return Some(s.to_string());
        }
        if let Some(n) = record.get(field).and_then(serde_json::Value::as_i64) {
            return Some(n.to_string());
        }
    }
    None
}

impl SourceDefinition {
    /// Returns the unique source identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the human-readable source name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the portal URL for this source, derived from the fetcher
    /// config when not set explicitly.
    #[must_use]
    pub fn portal_url(&self) -> Option<String> {
        if let Some(ref url) = self.portal_url {
            return Some(url.clone());
        }
        self.fetcher.derive_portal_url()
    }

    /// Returns the configured page size for this source's fetcher.
    #[must_use]
    pub const fn page_size(&self) -> u64 {
        match &self.fetcher {
            FetcherConfig::Socrata { page_size, .. } => *page_size,
        }
    }
}

/// Parses a [`SourceDefinition`] from a TOML string.
///
/// # Errors
///
/// Returns [`SourceError::Config`] if the TOML is malformed or missing
/// required fields.
pub fn parse_source_toml(toml_str: &str) -> Result<SourceDefinition, SourceError> {
    toml::de::from_str(toml_str).map_err(|e| SourceError::Config {
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_time_of_day_with_fraction() {
        let format = TimestampFormat::TimeOfDay {
            format: "%H:%M:%S%.f".to_string(),
        };
        let parsed = format.parse("10:07:30.0").unwrap();
        assert_eq!(parsed.time(), NaiveTime::from_hms_opt(10, 7, 30).unwrap());
        assert_eq!(parsed.date(), None);
    }

    #[test]
    fn parses_date_time() {
        let format = TimestampFormat::DateTime {
            format: "%Y-%m-%dT%H:%M:%S%.f".to_string(),
        };
        let parsed = format.parse("2024-01-15T23:50:00.000").unwrap();
        assert_eq!(parsed.time(), NaiveTime::from_hms_opt(23, 50, 0).unwrap());
        assert_eq!(
            parsed.date(),
            Some(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
        );
    }

    #[test]
    fn rejects_wrong_format() {
        let format = TimestampFormat::TimeOfDay {
            format: "%H:%M:%S%.f".to_string(),
        };
        assert!(format.parse("2024-01-15T10:00:00").is_none());
        assert!(format.parse("not a time").is_none());
    }

    #[test]
    fn extracts_incident_id_fallback() {
        let record = serde_json::json!({"incident_number": null, "id": "12345"});
        let fields = vec!["incident_number".to_string(), "id".to_string()];
        assert_eq!(extract_incident_id(&record, &fields).unwrap(), "12345");
    }

    #[test]
    fn extracts_numeric_incident_id() {
        let record = serde_json::json!({"objectid": 42});
        let fields = vec!["objectid".to_string()];
        assert_eq!(extract_incident_id(&record, &fields).unwrap(), "42");
    }

    #[test]
    fn extracts_socrata_date_field() {
        let toml_str = include_str!("../sources/la.toml");
        let def = parse_source_toml(toml_str).unwrap();
        let record = serde_json::json!({"incident_date": "2023-06-01T00:00:00.000"});
        assert_eq!(
            def.fields.extract_date(&record),
            Some(NaiveDate::from_ymd_opt(2023, 6, 1).unwrap())
        );
    }

    #[test]
    fn parses_la_toml() {
        let toml_str = include_str!("../sources/la.toml");
        let def = parse_source_toml(toml_str).unwrap();
        assert_eq!(def.id, "la_fd");
        assert_eq!(def.city, "Los Angeles");
        assert_eq!(def.fields.bucket_key, BucketKeyFormat::Clock);
        assert_eq!(
            def.fields.negative_response,
            NegativeResponsePolicy::PassThrough
        );
        assert_eq!(
            def.portal_url().as_deref(),
            Some("https://data.lacity.org/d/n44u-wxe4")
        );
    }

    #[test]
    fn parses_nyc_toml() {
        let toml_str = include_str!("../sources/nyc.toml");
        let def = parse_source_toml(toml_str).unwrap();
        assert_eq!(def.id, "nyc_fd");
        assert_eq!(def.fields.bucket_key, BucketKeyFormat::MinuteOfDay);
        assert!(matches!(
            def.fields.timestamp,
            TimestampFormat::DateTime { .. }
        ));
    }

    #[test]
    fn rejects_incomplete_toml() {
        let err = parse_source_toml("id = \"broken\"").unwrap_err();
        assert!(matches!(err, SourceError::Config { .. }));
    }
}
