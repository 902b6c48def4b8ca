//! Run timestamps.
//!
//! A run timestamp names the run's log directory, so it must be a single
//! path segment, and sorting the directory names as strings must sort the
//! runs by time. The fixed-width `2020-01-07T08-09-10.000Z` form satisfies
//! both.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use crate::error::{PublishError, PublishResult};

const FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.3fZ";

/// Timestamp identifying one publishing run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RunTimestamp(String);

impl RunTimestamp {
    /// Timestamp for the current instant.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.format(FORMAT).to_string())
    }

    /// Accept an externally supplied timestamp, e.g. from `PUBLISH_TIMESTAMP`.
    ///
    /// Any single path segment is accepted; names that do not parse as a time
    /// still work but may sort out of order against generated ones.
    pub fn new(value: impl Into<String>) -> PublishResult<Self> {
        let value = value.into();
        if value.is_empty() || value.contains('/') || value == "." || value == ".." {
            return Err(PublishError::invalid_timestamp(format!(
                "{:?} is not a single path segment",
                value
            )));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse a log directory name as a point in time.
    ///
    /// Accepts the generated colon-free form (with or without fractional
    /// seconds) and RFC 3339.
    pub fn parse(name: &str) -> Option<NaiveDateTime> {
        let trimmed = name.strip_suffix('Z').unwrap_or(name);
        NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H-%M-%S%.f")
            .ok()
            .or_else(|| {
                DateTime::parse_from_rfc3339(name)
                    .ok()
                    .map(|at| at.naive_utc())
            })
    }
}

impl fmt::Display for RunTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_format() {
        let at = Utc.with_ymd_and_hms(2020, 1, 7, 8, 9, 10).unwrap();
        assert_eq!(
            RunTimestamp::from_datetime(at).as_str(),
            "2020-01-07T08-09-10.000Z"
        );
    }

    #[test]
    fn test_string_order_matches_time_order() {
        let base = Utc.with_ymd_and_hms(2019, 12, 31, 23, 59, 59).unwrap();
        let stamps: Vec<_> = [0, 1, 999, 1_000, 86_400_000]
            .iter()
            .map(|ms| RunTimestamp::from_datetime(base + Duration::milliseconds(*ms)))
            .collect();

        let mut sorted = stamps.clone();
        sorted.sort();
        assert_eq!(sorted, stamps);
    }

    #[test]
    fn test_parse_round_trips_generated_names() {
        let at = Utc.with_ymd_and_hms(2020, 1, 7, 8, 9, 10).unwrap();
        let stamp = RunTimestamp::from_datetime(at);
        assert_eq!(RunTimestamp::parse(stamp.as_str()), Some(at.naive_utc()));
    }

    #[test]
    fn test_parse_accepts_other_forms() {
        assert!(RunTimestamp::parse("2020-01-01T00-00-00").is_some());
        assert!(RunTimestamp::parse("2020-01-01T00:00:00.000Z").is_some());
        assert!(RunTimestamp::parse("latest").is_none());
    }

    #[test]
    fn test_new_rejects_paths() {
        assert!(RunTimestamp::new("2020-01-01T00-00-00").is_ok());
        assert!(RunTimestamp::new("").is_err());
        assert!(RunTimestamp::new("a/b").is_err());
        assert!(RunTimestamp::new("..").is_err());
    }
}
