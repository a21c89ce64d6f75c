//! Timestamp parsing and the requested time window.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::fmt;

use crate::error::{Result, SeisplotError};

/// Formats accepted for naive (offset-less) timestamps, interpreted as UTC
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y%m%dT%H%M%S%.f",
    "%Y%m%dT%H%M%S",
];

/// Parse a timestamp the way seismologists usually write them.
///
/// Accepts RFC 3339 (with `Z` or an offset), ISO 8601 without offset,
/// plain dates and `YYYY-DDD` ordinal dates. Offset-less values are UTC.
pub fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    let naive = value.strip_suffix('Z').unwrap_or(value);
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, format) {
            return Some(dt.and_utc());
        }
    }

    NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(naive, "%Y-%j"))
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Parse a named query parameter as a timestamp
pub fn parse_param(param: &str, value: &str) -> Result<DateTime<Utc>> {
    parse_datetime(value).ok_or_else(|| SeisplotError::InvalidParameter {
        param: param.to_string(),
        message: format!("Not a valid timestamp: {}", value),
    })
}

/// A requested time window.
///
/// `start <= end` is expected but not enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Window length in seconds
    pub fn duration_secs(&self) -> f64 {
        seconds_between(self.start, self.end)
    }

    /// Offset of `time` from the start of the window, in seconds
    pub fn offset_of(&self, time: DateTime<Utc>) -> f64 {
        seconds_between(self.start, time)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}",
            self.start.format("%Y-%m-%dT%H:%M:%S"),
            self.end.format("%Y-%m-%dT%H:%M:%S")
        )
    }
}

/// Signed difference `to - from` in seconds, with microsecond precision
pub fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1000.0,
    }
}
