//! Nanosecond-resolution timestamps.
//!
//! Every wire format in the protocol reads the same clock at a different
//! granularity: sync/cursor tokens carry unix nanoseconds, the conflict
//! rule compares microseconds, the integrity hash and session expirations
//! use milliseconds, and JWT `iat` uses seconds. A single `i64` nanosecond
//! representation keeps all of them exact and makes range queries in the
//! store plain integer comparisons.

use crate::error::{Error, Result};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// UTC instant with nanosecond resolution, persisted as unix nanoseconds.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// The unix epoch; used as the "no threshold" sentinel in sync queries.
    pub const EPOCH: Timestamp = Timestamp(0);

    /// Current time.
    pub fn now() -> Self {
        // i64 nanoseconds cover dates through the year 2262.
        Self(OffsetDateTime::now_utc().unix_timestamp_nanos() as i64)
    }

    pub fn from_unix_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    pub fn from_unix_millis(millis: i64) -> Self {
        Self(millis.saturating_mul(1_000_000))
    }

    pub fn unix_nanos(self) -> i64 {
        self.0
    }

    pub fn unix_micros(self) -> i64 {
        self.0.div_euclid(1_000)
    }

    pub fn unix_millis(self) -> i64 {
        self.0.div_euclid(1_000_000)
    }

    pub fn unix_seconds(self) -> i64 {
        self.0.div_euclid(1_000_000_000)
    }

    pub fn is_epoch(self) -> bool {
        self.0 == 0
    }

    /// Microseconds from `other` to `self`; the conflict-rule delta.
    pub fn micros_since(self, other: Timestamp) -> i64 {
        (self.0 - other.0).div_euclid(1_000)
    }

    /// Add a duration, saturating at the representable bounds.
    pub fn saturating_add(self, duration: time::Duration) -> Self {
        let nanos = i64::try_from(duration.whole_nanoseconds()).unwrap_or(i64::MAX);
        Self(self.0.saturating_add(nanos))
    }

    /// Subtract a duration, saturating at the representable bounds.
    pub fn saturating_sub(self, duration: time::Duration) -> Self {
        let nanos = i64::try_from(duration.whole_nanoseconds()).unwrap_or(i64::MAX);
        Self(self.0.saturating_sub(nanos))
    }

    pub fn format_rfc3339(self) -> Result<String> {
        let odt = OffsetDateTime::from_unix_timestamp_nanos(self.0 as i128)
            .map_err(|e| Error::InvalidTimestamp(e.to_string()))?;
        odt.format(&Rfc3339)
            .map_err(|e| Error::InvalidTimestamp(e.to_string()))
    }

    pub fn parse_rfc3339(value: &str) -> Result<Self> {
        let odt = OffsetDateTime::parse(value, &Rfc3339)
            .map_err(|e| Error::InvalidTimestamp(e.to_string()))?;
        Ok(Self(odt.unix_timestamp_nanos() as i64))
    }
}

impl From<OffsetDateTime> for Timestamp {
    fn from(odt: OffsetDateTime) -> Self {
        Self(odt.unix_timestamp_nanos() as i64)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let formatted = self
            .format_rfc3339()
            .map_err(|e| serde::ser::Error::custom(e.to_string()))?;
        serializer.serialize_str(&formatted)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        // Clients may omit the field or send an explicit null; both mean
        // "no timestamp" and map to the epoch sentinel.
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(Timestamp::EPOCH),
            Some(value) => {
                Timestamp::parse_rfc3339(&value).map_err(|e| D::Error::custom(e.to_string()))
            }
        }
    }
}
