//! Log timestamps for ARBOR.
//!
//! Node logs stamp every line with a wall-clock instant at millisecond
//! resolution. The stamps carry no zone, so they are read as UTC and only
//! ever compared with each other.

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Format of the timestamp token, `yyyy/MM/dd-HH:mm:ss,SSS`
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y/%m/%d-%H:%M:%S,%3f";

/// Millisecond-resolution instant taken from a log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    /// Parse a timestamp token
    ///
    /// # Errors
    ///
    /// Returns error if the token does not match [`LOG_TIMESTAMP_FORMAT`]
    pub fn parse(raw: &str) -> CoreResult<Self> {
        NaiveDateTime::parse_from_str(raw, LOG_TIMESTAMP_FORMAT)
            .map(Self)
            .map_err(|e| CoreError::InvalidTimestamp {
                raw: raw.to_string(),
                reason: e.to_string(),
            })
    }

    /// Create from milliseconds since the Unix epoch
    #[must_use]
    pub fn from_millis(millis: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(millis).map(|dt| Self(dt.naive_utc()))
    }

    /// Milliseconds since the Unix epoch
    #[must_use]
    pub fn as_millis(&self) -> i64 {
        self.0.and_utc().timestamp_millis()
    }

    /// Signed milliseconds elapsed since `earlier`
    #[must_use]
    pub fn millis_since(&self, earlier: &Timestamp) -> i64 {
        (self.0 - earlier.0).num_milliseconds()
    }

    /// Time of day, `HH:mm:ss,SSS`
    #[must_use]
    pub fn clock(&self) -> String {
        self.0.format("%H:%M:%S,%3f").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(LOG_TIMESTAMP_FORMAT))
    }
}
