//! The persistence collaborator contract.

use std::fmt;

use floodgate_metrics::{IngestedMetric, MetricsCollection};
use futures::future::BoxFuture;
use parking_lot::Mutex;

/// An error raised by the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A metric has no encodable representation.
    #[error("failed to encode metric for storage")]
    EncodeFailed(#[source] serde_json::Error),

    /// The storage backend could not be reached.
    #[error("storage backend unavailable")]
    Unavailable,
}

/// The asynchronous persistence collaborator.
///
/// `apply` receives the frozen collection of one request and resolves to one
/// boolean per metric, positionally aligned with the collection's order: `true`
/// if the metric was durably accepted. Implementations must be safe to call
/// concurrently from many requests and must never reorder outcomes.
///
/// The storage engine itself lives outside this repository; production
/// deployments link its client through this trait. [`MemoryStore`] is the
/// in-tree stand-in used for development.
pub trait MetricsStore: fmt::Debug + Send + Sync {
    /// Persists all metrics of the collection asynchronously.
    fn apply(&self, collection: MetricsCollection) -> BoxFuture<'static, Result<Vec<bool>, StoreError>>;
}

/// Encodes one metric with the persistence codec.
///
/// Every value shape produced by decoding and conversion must pass through this
/// codec; the converter never emits a shape it cannot encode.
pub fn encode_metric(metric: &IngestedMetric) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(metric).map_err(StoreError::EncodeFailed)
}

/// An in-memory [`MetricsStore`] holding encoded metrics.
///
/// The development default: accepts everything that the codec can encode and
/// keeps the encoded records in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    written: Mutex<Vec<Vec<u8>>>,
}

impl MemoryStore {
    /// The number of metrics written so far.
    pub fn written(&self) -> usize {
        self.written.lock().len()
    }
}

impl MetricsStore for MemoryStore {
    fn apply(&self, collection: MetricsCollection) -> BoxFuture<'static, Result<Vec<bool>, StoreError>> {
        let mut outcomes = Vec::with_capacity(collection.len());
        let mut written = self.written.lock();

        for metric in collection.iter() {
            match encode_metric(metric) {
                Ok(encoded) => {
                    written.push(encoded);
                    outcomes.push(true);
                }
                Err(error) => {
                    floodgate_log::error!(
                        error = &error as &dyn std::error::Error,
                        metric = metric.name(),
                        "failed to encode metric",
                    );
                    outcomes.push(false);
                }
            }
        }

        drop(written);
        Box::pin(std::future::ready(Ok(outcomes)))
    }
}

#[cfg(test)]
mod tests {
    use floodgate_common::UnixTimestamp;
    use floodgate_metrics::{Metric, MetricValue};

    use super::*;

    #[tokio::test]
    async fn test_memory_store_persists_in_order() {
        let store = MemoryStore::default();

        let mut collection = MetricsCollection::new();
        collection.add(vec![
            Metric {
                tenant_id: "836986".to_owned(),
                name: "cpu.idle".to_owned(),
                timestamp: UnixTimestamp::from_millis(1_446_310_800_000),
                value: MetricValue::Int(95),
                unit: Some("percent".to_owned()),
                ttl_seconds: 172_800,
            },
            Metric {
                tenant_id: "836986".to_owned(),
                name: "cpu.load".to_owned(),
                timestamp: UnixTimestamp::from_millis(1_446_310_800_000),
                value: MetricValue::Float(2.321),
                unit: None,
                ttl_seconds: 172_800,
            },
        ]);

        let outcomes = store.apply(collection).await.unwrap();
        assert_eq!(outcomes, vec![true, true]);
        assert_eq!(store.written(), 2);
    }
}
