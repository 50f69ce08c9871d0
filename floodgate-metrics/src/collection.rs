//! The per-request collection of validated metrics submitted to persistence.

use floodgate_common::UnixTimestamp;
use serde::Serialize;

use crate::convert::PreaggregatedMetric;
use crate::protocol::Metric;

/// Any metric accepted for ingestion.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum IngestedMetric {
    /// A metric from the raw per-metric JSON format.
    Raw(Metric),
    /// A metric derived from a pre-aggregated bundle.
    Preaggregated(PreaggregatedMetric),
}

impl IngestedMetric {
    /// The tenant this metric belongs to.
    pub fn tenant_id(&self) -> &str {
        match self {
            Self::Raw(metric) => &metric.tenant_id,
            Self::Preaggregated(metric) => &metric.tenant_id,
        }
    }

    /// The metric name.
    pub fn name(&self) -> &str {
        match self {
            Self::Raw(metric) => &metric.name,
            Self::Preaggregated(metric) => &metric.name,
        }
    }

    /// The collection timestamp.
    pub fn timestamp(&self) -> UnixTimestamp {
        match self {
            Self::Raw(metric) => metric.timestamp,
            Self::Preaggregated(metric) => metric.timestamp,
        }
    }

    /// The currently assigned retention in seconds.
    pub fn ttl_seconds(&self) -> u64 {
        match self {
            Self::Raw(metric) => metric.ttl_seconds,
            Self::Preaggregated(metric) => metric.ttl_seconds,
        }
    }

    /// Overrides the retention. Used by the TTL enforcer only.
    pub fn set_ttl_seconds(&mut self, ttl_seconds: u64) {
        match self {
            Self::Raw(metric) => metric.ttl_seconds = ttl_seconds,
            Self::Preaggregated(metric) => metric.ttl_seconds = ttl_seconds,
        }
    }
}

impl From<Metric> for IngestedMetric {
    fn from(metric: Metric) -> Self {
        Self::Raw(metric)
    }
}

impl From<PreaggregatedMetric> for IngestedMetric {
    fn from(metric: PreaggregatedMetric) -> Self {
        Self::Preaggregated(metric)
    }
}

/// The append-only aggregate of one request's validated metrics.
///
/// Created empty per request and populated once. Submission consumes the
/// collection, so it is frozen by ownership from that point on. Persistence
/// outcomes are positionally aligned with the iteration order of this collection.
#[derive(Clone, Debug, Default, Serialize)]
pub struct MetricsCollection {
    metrics: Vec<IngestedMetric>,
}

impl MetricsCollection {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends metrics, preserving their order.
    pub fn add<I>(&mut self, metrics: I)
    where
        I: IntoIterator,
        I::Item: Into<IngestedMetric>,
    {
        self.metrics.extend(metrics.into_iter().map(Into::into));
    }

    /// The number of metrics in the collection.
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// Returns `true` if the collection holds no metrics.
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Iterates the metrics in submission order.
    pub fn iter(&self) -> impl Iterator<Item = &IngestedMetric> {
        self.metrics.iter()
    }
}

impl IntoIterator for MetricsCollection {
    type Item = IngestedMetric;
    type IntoIter = std::vec::IntoIter<IngestedMetric>;

    fn into_iter(self) -> Self::IntoIter {
        self.metrics.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use crate::protocol::MetricValue;

    use super::*;

    fn metric(name: &str) -> Metric {
        Metric {
            tenant_id: "836986".to_owned(),
            name: name.to_owned(),
            timestamp: UnixTimestamp::from_millis(1_446_310_800_000),
            value: MetricValue::Int(1),
            unit: None,
            ttl_seconds: 172_800,
        }
    }

    #[test]
    fn test_collection_preserves_order() {
        let mut collection = MetricsCollection::new();
        collection.add(vec![metric("a"), metric("b")]);
        collection.add(vec![metric("c")]);

        let names: Vec<_> = collection.iter().map(|m| m.name().to_owned()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert_eq!(collection.len(), 3);
    }

    #[test]
    fn test_ttl_override() {
        let mut ingested = IngestedMetric::from(metric("a"));
        assert_eq!(ingested.ttl_seconds(), 172_800);

        ingested.set_ttl_seconds(432_000);
        assert_eq!(ingested.ttl_seconds(), 432_000);
    }
}
