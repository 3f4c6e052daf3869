//! `_scraped_at` formatting and parsing.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// Format an ingestion timestamp: RFC 3339, UTC, microseconds, `Z` suffix.
#[must_use]
pub fn format_scraped_at(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current ingestion timestamp.
#[must_use]
pub fn now_scraped_at() -> String {
    format_scraped_at(Utc::now())
}

/// Parse a stored `_scraped_at` value.
///
/// Accepts RFC 3339 (`2025-03-14T16:15:30.5Z`, any offset), naive ISO-8601
/// assumed to be UTC (`2025-03-14T16:15:30`), and the legacy
/// `2025-03-14 16:15:30 UTC` form. Returns `None` for anything else.
#[must_use]
pub fn parse_scraped_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    let naive = raw.strip_suffix(" UTC").unwrap_or(raw);
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
        .map(|at| at.and_utc())
}
