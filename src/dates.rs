//! Date parsing helpers.
//!
//! Storage hands dates back as strings. Anything that is not an ISO calendar
//! date or a timestamp is treated as absent rather than an error.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Parse a stored date.
///
/// Accepts `YYYY-MM-DD`, RFC 3339 timestamps and naive `YYYY-MM-DDTHH:MM:SS`
/// timestamps; timestamps are truncated to their calendar date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.date_naive());
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.date())
}

/// First day of an approximate year/month. Missing or out-of-range months
/// fall back to January.
pub fn approximate_date(year: i32, month: Option<i32>) -> Option<NaiveDate> {
    let month = month
        .filter(|m| (1..=12).contains(m))
        .map(|m| m as u32)
        .unwrap_or(1);
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Signed whole days from `earlier` to `later`.
pub fn days_between(later: NaiveDate, earlier: NaiveDate) -> i64 {
    later.signed_duration_since(earlier).num_days()
}

/// Inclusive day count of `[start, end]`.
pub fn inclusive_days(start: NaiveDate, end: NaiveDate) -> u32 {
    (days_between(end, start) + 1).max(0) as u32
}
