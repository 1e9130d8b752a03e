//! ISO-8601 time bounds for log queries

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// A parsed time bound. Bounds without an offset are forwarded as local
/// wall-clock times, the same way the upstream logs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBound {
    Zoned(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

impl TimeBound {
    /// Parse an ISO-8601 timestamp: RFC 3339 (`Z` or numeric offset), a
    /// date-time without offset, or a bare date (midnight).
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();

        if let Ok(zoned) = DateTime::parse_from_rfc3339(raw) {
            return Ok(TimeBound::Zoned(zoned));
        }

        for format in NAIVE_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
                return Ok(TimeBound::Naive(naive));
            }
        }

        match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) => date
                .and_hms_opt(0, 0, 0)
                .map(TimeBound::Naive)
                .ok_or_else(|| format!("Invalid isoformat string: '{}'", raw)),
            Err(_) => Err(format!("Invalid isoformat string: '{}'", raw)),
        }
    }

    /// Query-string form sent upstream
    pub fn to_iso_string(&self) -> String {
        match self {
            TimeBound::Zoned(dt) => dt.to_rfc3339(),
            TimeBound::Naive(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
        }
    }
}
