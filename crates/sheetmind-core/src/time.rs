//! Timestamp helpers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A UTC timestamp, serialised as RFC3339 everywhere it crosses a store or
/// wire boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    /// The current instant.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// RFC3339 string, the canonical on-disk representation.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Parse an RFC3339 string produced by [`Self::to_rfc3339`].
    ///
    /// # Errors
    ///
    /// Returns an error if `s` is not a valid RFC3339 timestamp.
    pub fn parse_rfc3339(s: &str) -> Result<Self, chrono::ParseError> {
        Ok(Self(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc)))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_rfc3339() {
        let ts = Timestamp::now();
        let s = ts.to_rfc3339();
        let back = Timestamp::parse_rfc3339(&s).unwrap();
        assert_eq!(ts.0.timestamp_millis(), back.0.timestamp_millis());
    }
}
