//! Temporal validation windows for collection timestamps.

use std::time::Duration;

use floodgate_common::UnixTimestamp;

/// The tolerated window of collection timestamps around ingestion time.
///
/// A timestamp is acceptable if it satisfies
/// `now - past <= timestamp <= now + future`. Both tolerances come from
/// configuration and are injected into validation at construction time.
#[derive(Clone, Copy, Debug)]
pub struct IngestionWindow {
    /// How far in the past a collection timestamp may lie.
    pub past: Duration,
    /// How far in the future a collection timestamp may lie.
    pub future: Duration,
}

impl IngestionWindow {
    /// Checks a collection timestamp against the window.
    pub fn check(&self, timestamp: UnixTimestamp, now: UnixTimestamp) -> Result<(), TemporalSkew> {
        if timestamp > now.saturating_add(self.future) {
            return Err(TemporalSkew::Future(timestamp - now));
        }

        if timestamp < now.saturating_sub(self.past) {
            return Err(TemporalSkew::Past(now - timestamp));
        }

        Ok(())
    }
}

/// A collection timestamp outside the tolerated [`IngestionWindow`].
///
/// Carries the direction and the magnitude of the skew relative to ingestion time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TemporalSkew {
    /// The timestamp lies too far in the future.
    Future(Duration),
    /// The timestamp lies too far in the past.
    Past(Duration),
}

impl TemporalSkew {
    /// Renders the validation error message for a skewed timestamp.
    pub fn message(&self, timestamp: UnixTimestamp) -> String {
        match self {
            Self::Future(skew) => format!(
                "collection time '{timestamp}' is in the future by {}ms",
                skew.as_millis()
            ),
            Self::Past(skew) => format!(
                "collection time '{timestamp}' is in the past by {}ms",
                skew.as_millis()
            ),
        }
    }
}

/// The threshold after which a metric counts as delayed.
///
/// A metric is delayed when its collection time is older than
/// `now - tracker_delay - short_rollup_delay`. Delayed metrics are still ingested;
/// the classification only feeds the delayed metrics tracker so that downstream
/// rollup correctness can be monitored.
#[derive(Clone, Copy, Debug)]
pub struct DelayThreshold {
    /// Grace period before a late metric is reported to the tracker.
    pub tracker_delay: Duration,
    /// The delay already absorbed by short-delay rollups.
    pub short_rollup_delay: Duration,
}

impl DelayThreshold {
    /// Returns the observed delay if the timestamp is old enough to count as delayed.
    pub fn delay_of(&self, timestamp: UnixTimestamp, now: UnixTimestamp) -> Option<Duration> {
        let cutoff = now
            .saturating_sub(self.tracker_delay)
            .saturating_sub(self.short_rollup_delay);

        (timestamp < cutoff).then(|| now - timestamp)
    }
}
