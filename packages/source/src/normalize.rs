//! Normalizes raw feed records into [`NormalizedIncident`] values.
//!
//! Uses the source's [`FieldMapping`] to find the creation time, on-scene
//! time and locality of each record regardless of the feed's field naming.
//! Malformed records are skipped with a logged reason and never surface as
//! errors.

use fire_response_source_models::{
    BucketKey, NegativeResponsePolicy, NormalizedIncident, round_hundredths,
};

use crate::parsing::delta_minutes;
use crate::source_def::{FieldMapping, ParsedTimestamp, extract_incident_id, get_str};

/// Why a raw record was not turned into an incident.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SkipReason {
    /// A required field is absent, null, or empty.
    #[error("missing required field '{field}'")]
    MissingField {
        /// JSON field name.
        field: String,
    },

    /// A timestamp field does not parse under the configured format.
    #[error("field '{field}' value {value:?} does not match format '{format}'")]
    UnparsableTimestamp {
        /// JSON field name.
        field: String,
        /// The raw value.
        value: String,
        /// The expected `chrono` format.
        format: String,
    },

    /// The on-scene time precedes the creation time and the source rejects
    /// negative response times.
    #[error("negative response time of {minutes} minutes")]
    NegativeResponse {
        /// The computed response time.
        minutes: f64,
    },
}

/// Normalizes a list of raw records, dropping the malformed ones.
#[must_use]
pub fn normalize_records(
    records: &[serde_json::Value],
    fields: &FieldMapping,
) -> Vec<NormalizedIncident> {
    records
        .iter()
        .filter_map(|record| normalize_record(record, fields))
        .collect()
}

/// Normalizes a single raw record.
///
/// Returns `None` and logs the reason when the record is missing a required
/// field or carries a timestamp in an unexpected format.
#[must_use]
pub fn normalize_record(
    record: &serde_json::Value,
    fields: &FieldMapping,
) -> Option<NormalizedIncident> {
    match try_normalize_record(record, fields) {
        Ok(incident) => Some(incident),
        Err(reason) => {
            let id = extract_incident_id(record, &fields.incident_id);
            log::warn!(
                "Skipping record {}: {reason}",
                id.as_deref().unwrap_or("<no id>")
            );
            None
        }
    }
}

/// Normalizes a single raw record, returning the skip reason on failure.
///
/// # Errors
///
/// Returns [`SkipReason`] describing why the record cannot be normalized.
pub fn try_normalize_record(
    record: &serde_json::Value,
    fields: &FieldMapping,
) -> Result<NormalizedIncident, SkipReason> {
    let created = parse_timestamp_field(record, &fields.created_at, fields)?;
    let on_scene = parse_timestamp_field(record, &fields.on_scene_at, fields)?;
    let locality = get_text(record, &fields.locality).ok_or_else(|| SkipReason::MissingField {
        field: fields.locality.clone(),
    })?;

    let delta = match (created, on_scene) {
        (ParsedTimestamp::DateTime(start), ParsedTimestamp::DateTime(end)) => end - start,
        (start, end) => end.time() - start.time(),
    };

    let minutes = apply_policy(delta_minutes(delta), fields.negative_response)?;

    Ok(NormalizedIncident {
        source_incident_id: extract_incident_id(record, &fields.incident_id),
        occurred_at: BucketKey::from_time(created.time(), fields.bucket_key),
        occurred_date: created.date().or_else(|| fields.extract_date(record)),
        response_minutes: round_hundredths(minutes),
        locality,
    })
}

fn parse_timestamp_field(
    record: &serde_json::Value,
    field: &str,
    fields: &FieldMapping,
) -> Result<ParsedTimestamp, SkipReason> {
    let value = get_text(record, field).ok_or_else(|| SkipReason::MissingField {
        field: field.to_string(),
    })?;
    fields
        .timestamp
        .parse(&value)
        .ok_or_else(|| SkipReason::UnparsableTimestamp {
            field: field.to_string(),
            value,
            format: fields.timestamp.format_str().to_string(),
        })
}

fn apply_policy(minutes: f64, policy: NegativeResponsePolicy) -> Result<f64, SkipReason> {
    if minutes >= 0.0 {
        return Ok(minutes);
    }
    match policy {
        NegativeResponsePolicy::PassThrough => Ok(minutes),
        NegativeResponsePolicy::Reject => Err(SkipReason::NegativeResponse {
            minutes: round_hundredths(minutes),
        }),
        NegativeResponsePolicy::Clamp => Ok(0.0),
        NegativeResponsePolicy::WrapMidnight => Ok(minutes + 24.0 * 60.0),
    }
}

/// Gets a trimmed, non-empty text value. Numeric values are stringified.
fn get_text(record: &serde_json::Value, field: &str) -> Option<String> {
    if let Some(s) = get_str(record, field) {
        let trimmed = s.trim();
        return (!trimmed.is_empty()).then(|| trimmed.to_string());
    }
    record
        .get(field)
        .and_then(serde_json::Value::as_i64)
        .map(|n| n.to_string())
}
