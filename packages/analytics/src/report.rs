//! Plain-text report of the aggregates.
//!
//! A report is a sequence of sections. Each section starts with a heading
//! line ending in `:` followed by one `"<label>: <value>"` line per entry,
//! and sections are separated by a blank line:
//!
//! ```text
//! Los Angeles Fire Department average response time by period (minutes):
//! 10:00 - 11:59: 6.25
//! 22:00 - 23:59: 5.00
//!
//! Los Angeles Fire Department fires per locality:
//! A: 2
//! B: 1
//! ```
//!
//! [`parse_report`] reads this exact format back for plotting.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;

use duckdb::Connection;
use fire_response_analytics_models::{
    LocalityCount, PeriodAverage, ReportEntry, ReportSection, ReportValue,
};

use crate::{AnalyticsError, locality_counts, period_averages};

/// Builds a section from period averages.
#[must_use]
pub fn period_section(title: &str, averages: &[PeriodAverage]) -> ReportSection {
    ReportSection {
        title: title.to_string(),
        entries: averages
            .iter()
            .map(|avg| ReportEntry {
                label: avg.period.label(),
                value: ReportValue::Average(avg.average_minutes),
            })
            .collect(),
    }
}

/// Builds a section from locality counts.
#[must_use]
pub fn locality_section(title: &str, counts: &[LocalityCount]) -> ReportSection {
    ReportSection {
        title: title.to_string(),
        entries: counts
            .iter()
            .map(|count| ReportEntry {
                label: count.name.clone(),
                value: ReportValue::Count(count.fires),
            })
            .collect(),
    }
}

/// Queries both aggregates and returns the period and locality sections
/// for one source, titled with `name`. Query failures yield empty
/// sections.
#[must_use]
pub fn source_sections(conn: &Connection, source_id: Option<&str>, name: &str) -> Vec<ReportSection> {
    vec![
        period_section(
            &format!("{name} average response time by period (minutes)"),
            &period_averages(conn, source_id),
        ),
        locality_section(
            &format!("{name} fires per locality"),
            &locality_counts(conn, source_id),
        ),
    ]
}

/// Renders sections in the report format.
#[must_use]
pub fn render_report(sections: &[ReportSection]) -> String {
    let mut out = String::new();

    for (i, section) in sections.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&section.title);
        out.push_str(":\n");
        for entry in &section.entries {
            let _ = writeln!(out, "{}: {}", entry.label, entry.value);
        }
    }

    out
}

/// Writes report text to `path`, creating parent directories. With
/// `append` the text is added to the end of an existing file.
///
/// # Errors
///
/// Returns [`AnalyticsError::Io`] if the file cannot be written.
pub fn write_report(path: &Path, text: &str, append: bool) -> Result<(), AnalyticsError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)?;
    file.write_all(text.as_bytes())?;

    log::debug!("Wrote {} bytes to {}", text.len(), path.display());
    Ok(())
}

/// Parses report text back into sections.
///
/// Blank lines are ignored. Entries that appear before any heading are
/// collected into a section with an empty title.
///
/// # Errors
///
/// Returns [`AnalyticsError::Parse`] for a line that is neither a heading
/// nor a `"<label>: <number>"` entry.
pub fn parse_report(text: &str) -> Result<Vec<ReportSection>, AnalyticsError> {
    let mut sections: Vec<ReportSection> = Vec::new();

    for (i, raw) in text.lines().enumerate() {
        let line = raw.trim_end();
        if line.is_empty() {
            continue;
        }

        if let Some(title) = line.strip_suffix(':') {
            sections.push(ReportSection {
                title: title.to_string(),
                entries: Vec::new(),
            });
            continue;
        }

        let (label, value) = line.rsplit_once(": ").ok_or_else(|| AnalyticsError::Parse {
            line: i + 1,
            message: format!("expected '<label>: <value>', got {line:?}"),
        })?;
        let value = parse_value(value).ok_or_else(|| AnalyticsError::Parse {
            line: i + 1,
            message: format!("value {value:?} is not a number"),
        })?;

        if sections.is_empty() {
            sections.push(ReportSection {
                title: String::new(),
                entries: Vec::new(),
            });
        }
        if let Some(section) = sections.last_mut() {
            section.entries.push(ReportEntry {
                label: label.to_string(),
                value,
            });
        }
    }

    Ok(sections)
}

fn parse_value(s: &str) -> Option<ReportValue> {
    let s = s.trim();
    s.parse::<u64>().map(ReportValue::Count).ok().or_else(|| {
        s.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(ReportValue::Average)
    })
}
