//! Utilities to deal with date-time types. (SystemTime, Duration, epoch timestamps)

use std::fmt;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// A unix timestamp in milliseconds (elapsed since 1970-01-01 00:00 UTC).
///
/// Collection timestamps on the wire are epoch milliseconds, so this type keeps
/// millisecond precision end to end instead of rounding to full seconds.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct UnixTimestamp(u64);

impl UnixTimestamp {
    /// Creates a unix timestamp from the given number of milliseconds.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Creates a unix timestamp from the given number of seconds.
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1000))
    }

    /// Creates a unix timestamp from the given system time.
    pub fn from_system(time: SystemTime) -> Self {
        let duration = time
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default();

        Self(duration.as_millis() as u64)
    }

    /// Returns the current timestamp.
    #[inline]
    pub fn now() -> Self {
        Self::from_system(SystemTime::now())
    }

    /// Returns the number of milliseconds since the UNIX epoch start.
    pub fn as_millis(self) -> u64 {
        self.0
    }

    /// Returns the number of full seconds since the UNIX epoch start.
    pub fn as_secs(self) -> u64 {
        self.0 / 1000
    }

    /// Adds a duration, saturating at the maximum representable timestamp.
    pub fn saturating_add(self, duration: Duration) -> Self {
        Self(self.0.saturating_add(duration.as_millis() as u64))
    }

    /// Subtracts a duration, saturating at the epoch.
    pub fn saturating_sub(self, duration: Duration) -> Self {
        Self(self.0.saturating_sub(duration.as_millis() as u64))
    }

    /// Returns the duration elapsed between `earlier` and this timestamp.
    ///
    /// Returns `None` if `earlier` is later than this timestamp.
    pub fn checked_duration_since(self, earlier: Self) -> Option<Duration> {
        self.0.checked_sub(earlier.0).map(Duration::from_millis)
    }
}

impl fmt::Debug for UnixTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnixTimestamp({})", self.as_millis())
    }
}

impl fmt::Display for UnixTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_millis().fmt(f)
    }
}

impl std::ops::Sub for UnixTimestamp {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Self::Output {
        Duration::from_millis(self.0 - rhs.0)
    }
}

/// An error returned from parsing [`UnixTimestamp`].
#[derive(Clone, Copy, Debug)]
pub struct ParseUnixTimestampError(());

impl fmt::Display for ParseUnixTimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid unix timestamp")
    }
}

impl std::error::Error for ParseUnixTimestampError {}

impl std::str::FromStr for UnixTimestamp {
    type Err = ParseUnixTimestampError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ts = s.parse().or(Err(ParseUnixTimestampError(())))?;
        Ok(Self(ts))
    }
}

impl Serialize for UnixTimestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u64(self.as_millis())
    }
}

impl<'de> Deserialize<'de> for UnixTimestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Self::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn test_from_secs() {
        assert_eq!(UnixTimestamp::from_secs(4711).as_millis(), 4_711_000);
        assert_eq!(UnixTimestamp::from_secs(4711).as_secs(), 4711);
    }

    #[test]
    fn test_saturating_arithmetic() {
        let ts = UnixTimestamp::from_millis(10_000);
        assert_eq!(
            ts.saturating_sub(Duration::from_secs(60)),
            UnixTimestamp::from_millis(0)
        );
        assert_eq!(
            ts.saturating_add(Duration::from_millis(500)).as_millis(),
            10_500
        );
    }

    #[test]
    fn test_checked_duration_since() {
        let earlier = UnixTimestamp::from_millis(1_000);
        let later = UnixTimestamp::from_millis(3_500);

        assert_eq!(
            later.checked_duration_since(earlier),
            Some(Duration::from_millis(2_500))
        );
        assert_eq!(earlier.checked_duration_since(later), None);
    }

    #[test]
    fn test_serde() {
        let ts: UnixTimestamp = serde_json::from_str("1446310800000").unwrap();
        assert_eq!(ts.as_millis(), 1_446_310_800_000);
        assert_eq!(serde_json::to_string(&ts).unwrap(), "1446310800000");
    }
}
