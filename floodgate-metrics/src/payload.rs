//! The pre-aggregated bundle format submitted by collection agents.

use std::collections::BTreeMap;
use std::time::Duration;

use floodgate_common::UnixTimestamp;
use serde::Deserialize;

use crate::protocol::{ParseMetricsError, ValidationError};
use crate::validation::{DelayThreshold, IngestionWindow};

/// One agent-submitted bundle of pre-aggregated statistics.
///
/// All statistics in a bundle share a single collection timestamp; temporal
/// validation therefore applies to the bundle as a whole and is batch-fatal.
/// The payload is constructed once per request and discarded after conversion.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedPayload {
    /// The tenant this bundle belongs to.
    pub tenant_id: String,
    /// The check that produced the underlying measurements.
    #[serde(default)]
    pub check_id: Option<String>,
    /// The collection the measurements were taken for.
    #[serde(default)]
    pub collection_name: Option<String>,
    /// The instant the underlying measurements were taken, in epoch milliseconds.
    pub timestamp: UnixTimestamp,
    /// The agent's flush interval in milliseconds. Zero when unknown.
    #[serde(default)]
    pub flush_interval: u64,
    /// Pre-aggregated counters.
    #[serde(default)]
    pub counters: Vec<CounterEntry>,
    /// Pre-aggregated gauges.
    #[serde(default)]
    pub gauges: Vec<GaugeEntry>,
    /// Pre-aggregated sets.
    #[serde(default)]
    pub sets: Vec<SetEntry>,
    /// Pre-aggregated timers.
    #[serde(default)]
    pub timers: Vec<TimerEntry>,
    /// Pre-aggregated enums.
    #[serde(default)]
    pub enums: Vec<EnumEntry>,
}

/// A raw counter entry of a bundle.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterEntry {
    /// The counter name.
    pub name: String,
    /// The aggregated count, still untyped.
    pub value: serde_json::Number,
    /// The per-second rate reported by the agent, if any.
    #[serde(default)]
    pub rate: Option<f64>,
    /// The number of raw samples the agent folded into this entry, if reported.
    #[serde(default)]
    pub sample_count: Option<u64>,
}

/// A raw gauge entry of a bundle.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GaugeEntry {
    /// The gauge name.
    pub name: String,
    /// The last reported value, still untyped.
    pub value: serde_json::Number,
}

/// A raw set entry of a bundle.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetEntry {
    /// The set name.
    pub name: String,
    /// The distinct members observed during the flush interval.
    #[serde(default)]
    pub values: Vec<String>,
}

/// A raw timer entry of a bundle.
///
/// Timers arrive as a summary of the samples observed during the flush interval,
/// optionally with precomputed percentiles keyed by their label (e.g. `"98"`).
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerEntry {
    /// The timer name.
    pub name: String,
    /// The number of samples observed.
    pub count: u64,
    /// The sample rate reported by the agent.
    #[serde(default)]
    pub rate: f64,
    /// The smallest observed sample.
    pub min: serde_json::Number,
    /// The largest observed sample.
    pub max: serde_json::Number,
    /// The sum of all samples.
    pub sum: serde_json::Number,
    /// The arithmetic mean of all samples.
    pub avg: serde_json::Number,
    /// The median sample.
    pub median: serde_json::Number,
    /// The standard deviation of all samples.
    pub std: serde_json::Number,
    /// Precomputed percentiles by label.
    #[serde(default)]
    pub percentiles: BTreeMap<String, serde_json::Number>,
}

/// A raw enum entry of a bundle.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumEntry {
    /// The enum metric name.
    pub name: String,
    /// Observed value labels and how often each was reported.
    #[serde(rename = "enumValues", default)]
    pub values: BTreeMap<String, i64>,
}

impl AggregatedPayload {
    /// Parses a bundle from a request body.
    ///
    /// Performs no temporal or business validation; see
    /// [`validation_errors`](Self::validation_errors).
    pub fn parse(slice: &[u8]) -> Result<Self, ParseMetricsError> {
        let value: serde_json::Value =
            serde_json::from_slice(slice).map_err(ParseMetricsError::InvalidJson)?;

        serde_json::from_value(value).map_err(ParseMetricsError::InvalidShape)
    }

    /// Validates the bundle against the ingestion window.
    ///
    /// All statistics share one collection timestamp, so a skewed timestamp yields
    /// exactly one error and fails the entire bundle before conversion.
    pub fn validation_errors(
        &self,
        now: UnixTimestamp,
        window: &IngestionWindow,
    ) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.tenant_id.is_empty() {
            errors.push(ValidationError {
                metric: self.identifier(),
                message: "no tenant id provided".to_owned(),
            });
        }

        if let Err(skew) = window.check(self.timestamp, now) {
            errors.push(ValidationError {
                metric: self.identifier(),
                message: skew.message(self.timestamp),
            });
        }

        errors
    }

    /// Returns the observed delay if the bundle arrived after its rollup
    /// eligibility window.
    ///
    /// Delayed classification is independent of validation: a bundle can be both
    /// delayed and invalid.
    pub fn delay(&self, now: UnixTimestamp, threshold: &DelayThreshold) -> Option<Duration> {
        threshold.delay_of(self.timestamp, now)
    }

    /// The identifier under which this bundle is reported, `tenant.check.collection`
    /// with absent parts omitted.
    pub fn identifier(&self) -> String {
        let mut identifier = self.tenant_id.clone();
        for part in [self.check_id.as_deref(), self.collection_name.as_deref()] {
            if let Some(part) = part {
                identifier.push('.');
                identifier.push_str(part);
            }
        }
        identifier
    }

    /// The total number of statistic entries across all kinds.
    pub fn len(&self) -> usize {
        self.counters.len() + self.gauges.len() + self.sets.len() + self.timers.len()
            + self.enums.len()
    }

    /// Returns `true` if the bundle contains no statistics.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use similar_asserts::assert_eq;

    use super::*;

    const NOW: UnixTimestamp = UnixTimestamp::from_millis(1_446_310_800_000);

    fn window() -> IngestionWindow {
        IngestionWindow {
            past: Duration::from_millis(259_200_000),
            future: Duration::from_millis(600_000),
        }
    }

    fn sample_payload(timestamp: u64) -> String {
        format!(
            r#"{{
                "tenantId": "836986",
                "checkId": "ch0001",
                "collectionName": "primary",
                "timestamp": {timestamp},
                "flushInterval": 15000,
                "counters": [{{"name": "visits", "value": 4, "rate": 0.26}}],
                "gauges": [{{"name": "load", "value": 2.321}}],
                "sets": [{{"name": "users", "values": ["a", "b"]}}],
                "timers": [{{
                    "name": "request_time",
                    "count": 32,
                    "rate": 2.13,
                    "min": 1,
                    "max": 5,
                    "sum": 21.0,
                    "avg": 2.5,
                    "median": 3,
                    "std": 1.5,
                    "percentiles": {{"98": 4.9}}
                }}],
                "enums": [{{"name": "status", "enumValues": {{"ok": 23, "error": 2}}}}]
            }}"#
        )
    }

    #[test]
    fn test_parse_bundle() {
        let payload = AggregatedPayload::parse(sample_payload(NOW.as_millis()).as_bytes()).unwrap();

        assert_eq!(payload.tenant_id, "836986");
        assert_eq!(payload.flush_interval, 15_000);
        assert_eq!(payload.len(), 5);
        assert_eq!(payload.identifier(), "836986.ch0001.primary");
    }

    #[test]
    fn test_parse_wrong_shape() {
        let error = AggregatedPayload::parse(b"[]").unwrap_err();
        assert!(matches!(error, ParseMetricsError::InvalidShape(_)));
    }

    #[test]
    fn test_timestamp_in_the_future() {
        let ts = NOW.saturating_add(Duration::from_millis(602_000));
        let payload = AggregatedPayload::parse(sample_payload(ts.as_millis()).as_bytes()).unwrap();

        let errors = payload.validation_errors(NOW, &window());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("is in the future by 602000ms"));
    }

    #[test]
    fn test_timestamp_in_the_past() {
        let ts = NOW.saturating_sub(Duration::from_millis(259_202_000));
        let payload = AggregatedPayload::parse(sample_payload(ts.as_millis()).as_bytes()).unwrap();

        let errors = payload.validation_errors(NOW, &window());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("is in the past by 259202000ms"));
    }

    #[test]
    fn test_delayed_bundle() {
        let threshold = DelayThreshold {
            tracker_delay: Duration::from_millis(300_000),
            short_rollup_delay: Duration::from_millis(300_000),
        };

        let late = NOW.saturating_sub(Duration::from_millis(602_000));
        let payload = AggregatedPayload::parse(sample_payload(late.as_millis()).as_bytes()).unwrap();
        assert_eq!(payload.delay(NOW, &threshold), Some(Duration::from_millis(602_000)));

        let recent = NOW.saturating_sub(Duration::from_millis(500_000));
        let payload =
            AggregatedPayload::parse(sample_payload(recent.as_millis()).as_bytes()).unwrap();
        assert_eq!(payload.delay(NOW, &threshold), None);
    }

    #[test]
    fn test_delayed_even_when_invalid() {
        let threshold = DelayThreshold {
            tracker_delay: Duration::from_millis(300_000),
            short_rollup_delay: Duration::from_millis(300_000),
        };

        // Far enough in the past to fail the window check and be delayed.
        let ts = NOW.saturating_sub(Duration::from_millis(259_202_000));
        let payload = AggregatedPayload::parse(sample_payload(ts.as_millis()).as_bytes()).unwrap();

        assert!(!payload.validation_errors(NOW, &window()).is_empty());
        assert!(payload.delay(NOW, &threshold).is_some());
    }
}
