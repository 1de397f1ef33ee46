//! # Temporal Types — Genesis Timestamps
//!
//! Defines `GenesisTime`, the UTC instant at which a chain (re)starts.
//!
//! ## Format
//!
//! Genesis documents carry nanosecond-precision RFC 3339 timestamps. The
//! rendering rule matches Tendermint's encoder: UTC, `Z` suffix, and the
//! fractional part present only when non-zero, with trailing zeros trimmed.
//!
//! ```text
//! 2019-12-11T16:11:34Z
//! 2021-02-18T06:00:00.5Z
//! 2021-02-18T06:00:00.123456789Z
//! ```
//!
//! Inputs with an explicit offset are accepted and converted to UTC, so the
//! canonical output never depends on the operator's local timezone.

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::GenesisError;

/// A UTC genesis timestamp with nanosecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GenesisTime(DateTime<Utc>);

impl GenesisTime {
    /// Parse an RFC 3339 timestamp, converting any offset to UTC.
    ///
    /// # Errors
    ///
    /// Returns [`GenesisError::InvalidTimestamp`] if the text is not RFC 3339.
    pub fn parse(s: &str) -> Result<Self, GenesisError> {
        let dt = DateTime::parse_from_rfc3339(s).map_err(|e| GenesisError::InvalidTimestamp {
            input: s.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self(dt.with_timezone(&Utc)))
    }

    /// The instant `duration` after this one, or `None` on overflow.
    pub fn checked_add(&self, duration: Duration) -> Option<Self> {
        self.0.checked_add_signed(duration).map(Self)
    }

    /// Render as RFC 3339 with a `Z` suffix and trimmed fractional seconds.
    pub fn to_rfc3339(&self) -> String {
        let base = self.0.format("%Y-%m-%dT%H:%M:%S").to_string();
        let nanos = self.0.nanosecond() % 1_000_000_000;
        if nanos == 0 {
            return format!("{base}Z");
        }
        let frac = format!("{nanos:09}");
        format!("{base}.{}Z", frac.trim_end_matches('0'))
    }
}

impl std::fmt::Display for GenesisTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl std::str::FromStr for GenesisTime {
    type Err = GenesisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for GenesisTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for GenesisTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_seconds_have_no_fraction() {
        let ts = GenesisTime::parse("2019-12-11T17:11:34+01:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2019-12-11T16:11:34Z");
    }

    #[test]
    fn test_fraction_trailing_zeros_trimmed() {
        let ts = GenesisTime::parse("2021-02-18T06:00:00.500000Z").unwrap();
        assert_eq!(ts.to_rfc3339(), "2021-02-18T06:00:00.5Z");
    }

    #[test]
    fn test_full_nanosecond_precision_kept() {
        let ts = GenesisTime::parse("2021-02-18T06:00:00.123456789Z").unwrap();
        assert_eq!(ts.to_rfc3339(), "2021-02-18T06:00:00.123456789Z");
    }

    #[test]
    fn test_offset_converted_to_utc() {
        let ts = GenesisTime::parse("2021-02-18T11:00:00+05:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2021-02-18T06:00:00Z");
    }

    #[test]
    fn test_invalid_input_rejected() {
        for bad in ["", "not-a-date", "2021-02-18", "2021-02-18T06:00:00"] {
            let err = GenesisTime::parse(bad).unwrap_err();
            assert!(matches!(err, GenesisError::InvalidTimestamp { .. }), "{bad}");
        }
    }

    #[test]
    fn test_checked_add() {
        let ts = GenesisTime::parse("2021-02-18T06:00:00Z").unwrap();
        let later = ts.checked_add(Duration::hours(48)).unwrap();
        assert_eq!(later.to_rfc3339(), "2021-02-20T06:00:00Z");
    }

    #[test]
    fn test_serde_uses_rfc3339_string() {
        let ts = GenesisTime::parse("2021-02-18T06:00:00.25Z").unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"2021-02-18T06:00:00.25Z\"");
        let back: GenesisTime = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }

    #[test]
    fn test_ordering() {
        let earlier = GenesisTime::parse("2021-02-18T06:00:00Z").unwrap();
        let later = GenesisTime::parse("2021-02-18T06:00:00.000000001Z").unwrap();
        assert!(earlier < later);
    }
}
