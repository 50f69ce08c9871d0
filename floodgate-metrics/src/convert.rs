//! Conversion of pre-aggregated bundles into canonical metric records.

use std::collections::{BTreeMap, BTreeSet};

use floodgate_common::UnixTimestamp;
use serde::Serialize;

use crate::payload::{
    AggregatedPayload, CounterEntry, EnumEntry, GaugeEntry, SetEntry, TimerEntry,
};
use crate::protocol::{MetricValue, ResolveNumberError, SetType, hash_set_value};

/// A metric derived from a pre-aggregated bundle.
///
/// Unlike raw metrics, these carry a statistic kind and a kind-specific value shape.
/// They are derived exclusively from an [`AggregatedPayload`] and never decoded
/// directly from the raw JSON metric format.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreaggregatedMetric {
    /// The tenant this metric belongs to.
    pub tenant_id: String,
    /// The statistic name as submitted by the agent.
    pub name: String,
    /// The bundle's collection timestamp.
    pub timestamp: UnixTimestamp,
    /// Retention in seconds. Overwritten by the TTL enforcer when TTLs are forced.
    pub ttl_seconds: u64,
    /// The kind-specific aggregated value.
    pub value: PreaggregatedValue,
}

/// The kind-specific value of a [`PreaggregatedMetric`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum PreaggregatedValue {
    /// An aggregated event count with its observed rate.
    Counter(CounterValue),
    /// An absolute snapshot of a value.
    Gauge(MetricValue),
    /// The hashed distinct members observed during the flush interval.
    Set(SetValue),
    /// A summary of timed samples with precomputed percentiles.
    Timer(TimerValue),
    /// Observed value labels and their counts.
    Enum(EnumValue),
}

/// The aggregated value of a counter statistic.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterValue {
    /// The aggregated count.
    pub count: MetricValue,
    /// Events per second over the flush interval.
    pub rate: f64,
    /// The number of raw samples folded into this entry.
    pub sample_count: u64,
}

/// The hashed members of a set statistic. Cardinality is the set's length.
pub type SetValue = BTreeSet<SetType>;

/// The aggregated value of a timer statistic.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerValue {
    /// The number of samples observed.
    pub count: u64,
    /// The sample rate reported by the agent.
    pub rate: f64,
    /// The smallest observed sample.
    pub min: MetricValue,
    /// The largest observed sample.
    pub max: MetricValue,
    /// The sum of all samples.
    pub sum: MetricValue,
    /// The arithmetic mean of all samples.
    pub avg: MetricValue,
    /// The median sample.
    pub median: MetricValue,
    /// The standard deviation of all samples.
    pub std_dev: MetricValue,
    /// Precomputed percentiles by label.
    pub percentiles: BTreeMap<String, MetricValue>,
}

/// The aggregated value of an enum statistic.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumValue {
    /// Observed value labels and how often each was reported.
    pub counts: BTreeMap<String, i64>,
}

/// An error converting a bundle entry into a [`PreaggregatedMetric`].
///
/// Conversion runs after validation, so this indicates an entry whose numeric
/// literals have no encodable representation.
#[derive(Debug, thiserror::Error)]
#[error("cannot convert '{name}' ({kind})")]
pub struct ConvertError {
    /// The name of the offending entry.
    pub name: String,
    /// The statistic kind being converted.
    pub kind: &'static str,
    #[source]
    source: ResolveNumberError,
}

impl ConvertError {
    fn new(name: &str, kind: &'static str, source: ResolveNumberError) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            source,
        }
    }
}

/// Converts all statistics of a bundle into metric records, in bundle order
/// (counters, gauges, sets, timers, enums).
///
/// Bundles that do not state their flush interval fall back to the configured
/// default for rate derivation.
pub fn convert_payload(
    payload: &AggregatedPayload,
    ttl_seconds: u64,
    default_flush_interval_millis: u64,
) -> Result<Vec<PreaggregatedMetric>, ConvertError> {
    let tenant_id = payload.tenant_id.as_str();
    let timestamp = payload.timestamp;

    let flush_interval_millis = match payload.flush_interval {
        0 => default_flush_interval_millis,
        millis => millis,
    };

    let mut metrics = Vec::with_capacity(payload.len());
    metrics.extend(convert_counters(
        tenant_id,
        timestamp,
        flush_interval_millis,
        ttl_seconds,
        &payload.counters,
    )?);
    metrics.extend(convert_gauges(tenant_id, timestamp, ttl_seconds, &payload.gauges)?);
    metrics.extend(convert_sets(tenant_id, timestamp, ttl_seconds, &payload.sets));
    metrics.extend(convert_timers(tenant_id, timestamp, ttl_seconds, &payload.timers)?);
    metrics.extend(convert_enums(tenant_id, timestamp, ttl_seconds, &payload.enums));

    Ok(metrics)
}

/// Converts counter entries.
///
/// An entry without an explicit rate derives it from the flush interval; a zero
/// interval yields a rate of `0.0`.
pub fn convert_counters(
    tenant_id: &str,
    timestamp: UnixTimestamp,
    flush_interval_millis: u64,
    ttl_seconds: u64,
    counters: &[CounterEntry],
) -> Result<Vec<PreaggregatedMetric>, ConvertError> {
    counters
        .iter()
        .map(|counter| {
            let count = MetricValue::resolve(&counter.value)
                .map_err(|error| ConvertError::new(&counter.name, "counter", error))?;

            let rate = counter.rate.unwrap_or_else(|| {
                if flush_interval_millis > 0 {
                    count.to_f64() / (flush_interval_millis as f64 / 1000.0)
                } else {
                    0.0
                }
            });

            Ok(PreaggregatedMetric {
                tenant_id: tenant_id.to_owned(),
                name: counter.name.clone(),
                timestamp,
                ttl_seconds,
                value: PreaggregatedValue::Counter(CounterValue {
                    count,
                    rate,
                    sample_count: counter.sample_count.unwrap_or(1),
                }),
            })
        })
        .collect()
}

/// Converts gauge entries.
pub fn convert_gauges(
    tenant_id: &str,
    timestamp: UnixTimestamp,
    ttl_seconds: u64,
    gauges: &[GaugeEntry],
) -> Result<Vec<PreaggregatedMetric>, ConvertError> {
    gauges
        .iter()
        .map(|gauge| {
            let value = MetricValue::resolve(&gauge.value)
                .map_err(|error| ConvertError::new(&gauge.name, "gauge", error))?;

            Ok(PreaggregatedMetric {
                tenant_id: tenant_id.to_owned(),
                name: gauge.name.clone(),
                timestamp,
                ttl_seconds,
                value: PreaggregatedValue::Gauge(value),
            })
        })
        .collect()
}

/// Converts set entries. Members are hashed; duplicates collapse.
pub fn convert_sets(
    tenant_id: &str,
    timestamp: UnixTimestamp,
    ttl_seconds: u64,
    sets: &[SetEntry],
) -> Vec<PreaggregatedMetric> {
    sets.iter()
        .map(|set| PreaggregatedMetric {
            tenant_id: tenant_id.to_owned(),
            name: set.name.clone(),
            timestamp,
            ttl_seconds,
            value: PreaggregatedValue::Set(
                set.values.iter().map(|member| hash_set_value(member)).collect(),
            ),
        })
        .collect()
}

/// Converts timer entries, resolving the summary fields and every percentile.
pub fn convert_timers(
    tenant_id: &str,
    timestamp: UnixTimestamp,
    ttl_seconds: u64,
    timers: &[TimerEntry],
) -> Result<Vec<PreaggregatedMetric>, ConvertError> {
    timers
        .iter()
        .map(|timer| {
            let resolve = |number| {
                MetricValue::resolve(number)
                    .map_err(|error| ConvertError::new(&timer.name, "timer", error))
            };

            let mut percentiles = BTreeMap::new();
            for (label, number) in &timer.percentiles {
                percentiles.insert(label.clone(), resolve(number)?);
            }

            Ok(PreaggregatedMetric {
                tenant_id: tenant_id.to_owned(),
                name: timer.name.clone(),
                timestamp,
                ttl_seconds,
                value: PreaggregatedValue::Timer(TimerValue {
                    count: timer.count,
                    rate: timer.rate,
                    min: resolve(&timer.min)?,
                    max: resolve(&timer.max)?,
                    sum: resolve(&timer.sum)?,
                    avg: resolve(&timer.avg)?,
                    median: resolve(&timer.median)?,
                    std_dev: resolve(&timer.std)?,
                    percentiles,
                }),
            })
        })
        .collect()
}

/// Converts enum entries. The label/count map is carried verbatim.
pub fn convert_enums(
    tenant_id: &str,
    timestamp: UnixTimestamp,
    ttl_seconds: u64,
    enums: &[EnumEntry],
) -> Vec<PreaggregatedMetric> {
    enums
        .iter()
        .map(|entry| PreaggregatedMetric {
            tenant_id: tenant_id.to_owned(),
            name: entry.name.clone(),
            timestamp,
            ttl_seconds,
            value: PreaggregatedValue::Enum(EnumValue {
                counts: entry.values.clone(),
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    const TIMESTAMP: UnixTimestamp = UnixTimestamp::from_millis(1);
    const TTL: u64 = 432_000;

    /// A payload with 6 counters, 4 gauges, 2 sets, 4 timers and 1 enum, shaped like
    /// an agent submission.
    fn sample_payload() -> AggregatedPayload {
        let timer = |name: &str, count: u64| {
            serde_json::json!({
                "name": name,
                "count": count,
                "rate": 2.0,
                "min": 1,
                "max": 97,
                "sum": 150.50,
                "avg": 37.62,
                "median": 22,
                "std": 32.1,
                "percentiles": {"50": 22, "98": 94.1, "99": 97}
            })
        };

        let json = serde_json::json!({
            "tenantId": "1",
            "timestamp": 1,
            "flushInterval": 15000,
            "counters": [
                {"name": "visits", "value": 4, "rate": 0.26},
                {"name": "carts", "value": 12345},
                {"name": "errors.http", "value": 2, "rate": 0.13},
                {"name": "errors.tcp", "value": 1},
                {"name": "logins", "value": 9, "rate": 0.6},
                {"name": "logouts", "value": 2.321}
            ],
            "gauges": [
                {"name": "memory.free", "value": 128},
                {"name": "memory.used", "value": 64.5},
                {"name": "load.one", "value": 2.321},
                {"name": "load.five", "value": 12345}
            ],
            "sets": [
                {"name": "users", "values": ["a", "b", "c", "a"]},
                {"name": "sessions", "values": ["4267882815"]}
            ],
            "timers": [
                timer("request_time", 32),
                timer("render_time", 11),
                timer("db_time", 53),
                timer("queue_time", 7)
            ],
            "enums": [
                {"name": "status", "enumValues": {"ok": 23, "error": 2}}
            ]
        });

        serde_json::from_value(json).unwrap()
    }

    /// Every converted value must be encodable by the persistence codec.
    fn ensure_serializability(metrics: &[PreaggregatedMetric]) {
        for metric in metrics {
            serde_json::to_vec(metric).unwrap();
        }
    }

    #[test]
    fn test_counters() {
        let payload = sample_payload();
        let counters =
            convert_counters("1", TIMESTAMP, 15_000, TTL, &payload.counters).unwrap();

        assert_eq!(counters.len(), 6);
        ensure_serializability(&counters);

        let PreaggregatedValue::Counter(first) = &counters[0].value else {
            panic!("expected a counter");
        };
        assert_eq!(first.count, MetricValue::Int(4));
        assert_eq!(first.rate, 0.26);
        assert_eq!(first.sample_count, 1);
    }

    #[test]
    fn test_counter_rate_derived_from_flush_interval() {
        let payload = sample_payload();
        let counters =
            convert_counters("1", TIMESTAMP, 15_000, TTL, &payload.counters).unwrap();

        // "carts" has no explicit rate: 12345 over a 15s window.
        let PreaggregatedValue::Counter(counter) = &counters[1].value else {
            panic!("expected a counter");
        };
        assert_eq!(counter.rate, 12345.0 / 15.0);

        // A zero flush interval must not divide.
        let counters = convert_counters("1", TIMESTAMP, 0, TTL, &payload.counters).unwrap();
        let PreaggregatedValue::Counter(counter) = &counters[1].value else {
            panic!("expected a counter");
        };
        assert_eq!(counter.rate, 0.0);
    }

    #[test]
    fn test_number_resolution_round_trips() {
        let payload = sample_payload();
        let counters =
            convert_counters("1", TIMESTAMP, 15_000, TTL, &payload.counters).unwrap();

        // "2.321" stays a float equal to parsing the literal directly, "12345" stays
        // integral.
        let PreaggregatedValue::Counter(float_counter) = &counters[5].value else {
            panic!("expected a counter");
        };
        assert_eq!(float_counter.count, MetricValue::Float("2.321".parse().unwrap()));

        let PreaggregatedValue::Counter(int_counter) = &counters[1].value else {
            panic!("expected a counter");
        };
        assert_eq!(int_counter.count, MetricValue::Int("12345".parse().unwrap()));
    }

    #[test]
    fn test_gauges() {
        let payload = sample_payload();
        let gauges = convert_gauges("1", TIMESTAMP, TTL, &payload.gauges).unwrap();

        assert_eq!(gauges.len(), 4);
        ensure_serializability(&gauges);

        assert_eq!(gauges[0].value, PreaggregatedValue::Gauge(MetricValue::Int(128)));
        assert_eq!(
            gauges[1].value,
            PreaggregatedValue::Gauge(MetricValue::Float(64.5))
        );
    }

    #[test]
    fn test_sets() {
        let payload = sample_payload();
        let sets = convert_sets("1", TIMESTAMP, TTL, &payload.sets);

        assert_eq!(sets.len(), 2);
        ensure_serializability(&sets);

        // Duplicate members collapse: cardinality 3, not 4.
        let PreaggregatedValue::Set(members) = &sets[0].value else {
            panic!("expected a set");
        };
        assert_eq!(members.len(), 3);
        assert!(members.contains(&hash_set_value("a")));
    }

    #[test]
    fn test_timers() {
        let payload = sample_payload();
        let timers = convert_timers("1", TIMESTAMP, TTL, &payload.timers).unwrap();

        assert_eq!(timers.len(), 4);
        ensure_serializability(&timers);

        let PreaggregatedValue::Timer(timer) = &timers[0].value else {
            panic!("expected a timer");
        };
        assert_eq!(timer.count, 32);
        assert_eq!(timer.min, MetricValue::Int(1));
        assert_eq!(timer.sum, MetricValue::Float(150.50));
        assert_eq!(timer.percentiles["98"], MetricValue::Float(94.1));
        assert_eq!(timer.percentiles["50"], MetricValue::Int(22));
    }

    #[test]
    fn test_enums() {
        let payload = sample_payload();
        let enums = convert_enums("1", TIMESTAMP, TTL, &payload.enums);

        assert_eq!(enums.len(), 1);
        ensure_serializability(&enums);

        let PreaggregatedValue::Enum(value) = &enums[0].value else {
            panic!("expected an enum");
        };
        assert_eq!(value.counts["ok"], 23);
        assert_eq!(value.counts["error"], 2);
    }

    #[test]
    fn test_convert_payload_flush_interval_fallback() {
        let mut payload = sample_payload();
        payload.flush_interval = 0;

        let metrics = convert_payload(&payload, TTL, 15_000).unwrap();
        let PreaggregatedValue::Counter(counter) = &metrics[1].value else {
            panic!("expected a counter");
        };
        assert_eq!(counter.rate, 12345.0 / 15.0);
    }

    #[test]
    fn test_convert_payload_order_and_count() {
        let payload = sample_payload();
        let metrics = convert_payload(&payload, TTL, 15_000).unwrap();

        assert_eq!(metrics.len(), 17);
        assert_eq!(metrics[0].name, "visits");
        assert_eq!(metrics[16].name, "status");
        assert!(metrics.iter().all(|m| m.timestamp == TIMESTAMP));
        assert!(metrics.iter().all(|m| m.ttl_seconds == TTL));
        ensure_serializability(&metrics);
    }
}
