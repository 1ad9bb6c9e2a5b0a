//! Server timestamps kept at full precision.
//!
//! History rows are ordered by a server-assigned `timestamptz` with
//! microsecond resolution. A cursor built from a timestamp that lost its
//! sub-second digits (rounded to milliseconds, truncated to seconds) skips
//! every row sharing the truncated instant, so this type never formats with
//! fewer fractional digits than it holds.

use crate::TypesError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A UTC instant with nanosecond storage.
///
/// Serialized as RFC 3339 with every significant fractional digit
/// (`2024-05-01T10:00:00.123456Z`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordTimestamp(DateTime<Utc>);

impl RecordTimestamp {
    /// Current wall-clock time.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Wrap a chrono instant.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Build from seconds and nanoseconds since the Unix epoch.
    ///
    /// Returns `None` when out of range.
    pub fn from_unix(secs: i64, nanos: u32) -> Option<Self> {
        DateTime::from_timestamp(secs, nanos).map(Self)
    }

    /// Parse an RFC 3339 string, keeping every fractional digit.
    pub fn parse(value: &str) -> Result<Self, TypesError> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|e| TypesError::InvalidTimestamp {
                value: value.to_string(),
                reason: e.to_string(),
            })
    }

    /// Format as RFC 3339 without dropping precision.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    /// Borrow the chrono instant.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }
}

impl FromStr for RecordTimestamp {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RecordTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl fmt::Debug for RecordTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordTimestamp({})", self.to_rfc3339())
    }
}

impl Serialize for RecordTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for RecordTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn microseconds_survive_json() {
        let raw = "\"2024-05-01T10:00:00.123456Z\"";
        let ts: RecordTimestamp = serde_json::from_str(raw).unwrap();
        assert_eq!(serde_json::to_string(&ts).unwrap(), raw);
    }

    #[test]
    fn offset_form_from_postgres_is_normalized() {
        let ts = RecordTimestamp::parse("2024-05-01T10:00:00.000001+00:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-05-01T10:00:00.000001Z");
    }

    #[test]
    fn whole_seconds_have_no_fraction() {
        let ts = RecordTimestamp::from_unix(1_714_557_600, 0).unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-05-01T10:00:00Z");
    }

    #[test]
    fn nanoseconds_are_kept() {
        let ts = RecordTimestamp::from_unix(1_714_557_600, 1).unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-05-01T10:00:00.000000001Z");
        assert_eq!(RecordTimestamp::parse(&ts.to_rfc3339()).unwrap(), ts);
    }

    #[test]
    fn same_second_different_micros_order_correctly() {
        let a = RecordTimestamp::parse("2024-05-01T10:00:00.000100Z").unwrap();
        let b = RecordTimestamp::parse("2024-05-01T10:00:00.000200Z").unwrap();
        assert!(a < b);
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_non_rfc3339() {
        assert!(RecordTimestamp::parse("yesterday").is_err());
        assert!(RecordTimestamp::parse("1714557600").is_err());
    }
}
