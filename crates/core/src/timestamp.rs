//! Timestamp values
//!
//! Seconds plus nanoseconds since the Unix epoch, restricted to the years
//! 0001 through 9999 (UTC).

use crate::error::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use std::str::FromStr;

const MIN_SECONDS: i64 = -62_135_596_800;
const MAX_SECONDS: i64 = 253_402_300_799;
const MAX_NANOS: i32 = 999_999_999;

/// A point in time with nanosecond precision.
///
/// Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp {
    seconds: i64,
    nanos: i32,
}

impl Timestamp {
    /// Build from seconds and nanoseconds since the epoch.
    ///
    /// Fails if `nanos` is outside `0..=999_999_999` or the instant falls
    /// outside `0001-01-01T00:00:00Z..=9999-12-31T23:59:59.999999999Z`.
    pub fn of_seconds_and_nanos(seconds: i64, nanos: i32) -> Result<Self> {
        if !(0..=MAX_NANOS).contains(&nanos) {
            return Err(Error::invalid_request(format!(
                "Timestamp nanos {} out of range",
                nanos
            )));
        }
        if !(MIN_SECONDS..=MAX_SECONDS).contains(&seconds) {
            return Err(Error::invalid_request(format!(
                "Timestamp seconds {} out of range",
                seconds
            )));
        }
        Ok(Timestamp { seconds, nanos })
    }

    /// Build from microseconds since the epoch.
    pub fn of_micros(micros: i64) -> Result<Self> {
        let seconds = micros.div_euclid(1_000_000);
        let nanos = (micros.rem_euclid(1_000_000) * 1_000) as i32;
        Self::of_seconds_and_nanos(seconds, nanos)
    }

    /// Build from milliseconds since the epoch.
    pub fn from_millis(millis: i64) -> Result<Self> {
        let seconds = millis.div_euclid(1_000);
        let nanos = (millis.rem_euclid(1_000) * 1_000_000) as i32;
        Self::of_seconds_and_nanos(seconds, nanos)
    }

    /// The current time.
    pub fn now() -> Self {
        let now = Utc::now();
        Timestamp {
            seconds: now.timestamp(),
            nanos: now.timestamp_subsec_nanos() as i32,
        }
    }

    /// Earliest representable instant.
    pub fn min_value() -> Self {
        Timestamp {
            seconds: MIN_SECONDS,
            nanos: 0,
        }
    }

    /// Latest representable instant.
    pub fn max_value() -> Self {
        Timestamp {
            seconds: MAX_SECONDS,
            nanos: MAX_NANOS,
        }
    }

    /// Whole seconds since the epoch.
    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    /// Nanoseconds within the second.
    pub fn nanos(&self) -> i32 {
        self.nanos
    }

    /// Milliseconds since the epoch, dropping sub-millisecond precision.
    pub fn to_millis(&self) -> i64 {
        self.seconds * 1_000 + i64::from(self.nanos / 1_000_000)
    }

    /// Microseconds since the epoch, dropping sub-microsecond precision.
    pub fn to_micros(&self) -> i64 {
        self.seconds * 1_000_000 + i64::from(self.nanos / 1_000)
    }

    /// True if the timestamp has no precision below one millisecond.
    pub fn is_millis_precise(&self) -> bool {
        self.nanos % 1_000_000 == 0
    }

    /// Copy with sub-millisecond precision dropped.
    pub fn truncate_to_millis(&self) -> Self {
        Timestamp {
            seconds: self.seconds,
            nanos: self.nanos - self.nanos % 1_000_000,
        }
    }

    fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.seconds, self.nanos as u32)
    }

    /// Parse an RFC 3339 timestamp such as `2024-01-02T03:04:05.123456789Z`.
    pub fn parse(text: &str) -> Result<Self> {
        let parsed = DateTime::parse_from_rfc3339(text).map_err(|e| {
            Error::invalid_request(format!("Invalid timestamp {:?}: {}", text, e))
        })?;
        let utc = parsed.with_timezone(&Utc);
        Self::of_seconds_and_nanos(utc.timestamp(), utc.timestamp_subsec_nanos() as i32)
    }
}

impl fmt::Display for Timestamp {
    /// RFC 3339 in UTC with nine fraction digits.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::Nanos, true)),
            None => write!(f, "{}.{:09}s", self.seconds, self.nanos),
        }
    }
}

impl FromStr for Timestamp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Timestamp::parse(s)
    }
}
