//! Timestamp parsing and relative-time display
//!
//! The backend emits ISO-8601 timestamps in several shapes (with or without
//! fractional seconds, `Z` or a numeric offset, sometimes no zone at all).
//! Ordering must use the parsed instant; string comparison breaks as soon as
//! two shapes are mixed.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const MONTH: i64 = 30 * DAY;
const YEAR: i64 = 365 * DAY;

/// Display string for anything we cannot place in time.
pub const JUST_NOW: &str = "just now";

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// Parse a backend timestamp into an absolute instant.
///
/// Zone-less timestamps are taken as UTC, which is what the backend stores.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    let naive = raw.strip_suffix('Z').unwrap_or(raw);
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
        .map(|dt| Utc.from_utc_datetime(&dt))
}

/// Format an instant the way outgoing messages are stamped locally.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Bucket an elapsed duration (seconds) into a short human string.
///
/// One bucket set is used everywhere: seconds, minutes, hours, days,
/// 30-day months, 365-day years.
pub fn relative_time(elapsed_secs: i64) -> String {
    if elapsed_secs < 10 {
        return JUST_NOW.to_string();
    }

    let (count, unit) = match elapsed_secs {
        s if s < MINUTE => (s, "second"),
        s if s < HOUR => (s / MINUTE, "minute"),
        s if s < DAY => (s / HOUR, "hour"),
        s if s < MONTH => (s / DAY, "day"),
        s if s < YEAR => (s / MONTH, "month"),
        s => (s / YEAR, "year"),
    };

    if count == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", count, unit)
    }
}

/// Relative time between a raw backend timestamp and `now`.
///
/// Unparseable timestamps degrade to "just now" rather than failing.
pub fn relative_time_since(raw: &str, now: DateTime<Utc>) -> String {
    match parse_timestamp(raw) {
        Some(at) => relative_time((now - at).num_seconds()),
        None => JUST_NOW.to_string(),
    }
}
