//! Bounded-wait submission of metric collections to persistence.

use std::sync::Arc;
use std::time::Duration;

use floodgate_metrics::MetricsCollection;

use crate::services::{MetricsStore, StoreError};

/// The batch-level outcome of one submission.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BatchOutcome {
    /// The persistence layer accepted every metric within the deadline.
    AllPersisted,
    /// At least one metric was not persisted, or the persistence layer failed.
    ///
    /// There is no partial credit at the batch level even if only one metric
    /// failed.
    Failed,
    /// The persistence layer did not answer within the deadline. The submission
    /// is still in flight and may complete after the response is sent.
    TimedOut,
}

/// Submits frozen metric collections to the persistence collaborator.
///
/// The submission itself runs on a detached task; the processor only waits for
/// its result under the configured deadline. Handlers therefore never hold an
/// I/O thread beyond the deadline, and a timed-out submission is never
/// cancelled.
#[derive(Debug)]
pub struct IngestProcessor {
    store: Arc<dyn MetricsStore>,
    timeout: Duration,
}

impl IngestProcessor {
    /// Creates a processor submitting to the given store.
    pub fn new(store: Arc<dyn MetricsStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Submits a collection and awaits the per-metric outcome under the deadline.
    ///
    /// Persistence errors are downgraded to [`BatchOutcome::Failed`] here; they
    /// are logged with full detail and never propagate to the handler as errors.
    pub async fn submit(&self, collection: MetricsCollection) -> BatchOutcome {
        let submitted = collection.len();
        let task = tokio::spawn(self.store.apply(collection));

        let result = match tokio::time::timeout(self.timeout, task).await {
            Ok(result) => result,
            Err(_) => {
                // The task keeps running detached; only the wait is released.
                floodgate_log::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "timed out waiting for metrics to persist",
                );
                return BatchOutcome::TimedOut;
            }
        };

        let outcomes = match result {
            Ok(Ok(outcomes)) => outcomes,
            Ok(Err(error)) => return self.store_failed(&error),
            Err(join_error) => {
                floodgate_log::error!(
                    error = &join_error as &dyn std::error::Error,
                    "persistence task aborted",
                );
                return BatchOutcome::Failed;
            }
        };

        if outcomes.len() != submitted {
            floodgate_log::error!(
                submitted,
                returned = outcomes.len(),
                "persistence outcome count does not match submission",
            );
            return BatchOutcome::Failed;
        }

        let failed = outcomes.iter().filter(|&&persisted| !persisted).count();
        if failed > 0 {
            floodgate_log::warn!(failed, submitted, "trouble persisting metrics");
            return BatchOutcome::Failed;
        }

        BatchOutcome::AllPersisted
    }

    fn store_failed(&self, error: &StoreError) -> BatchOutcome {
        floodgate_log::error!(
            error = error as &dyn std::error::Error,
            "persisting metrics failed",
        );
        BatchOutcome::Failed
    }
}

#[cfg(test)]
mod tests {
    use floodgate_common::UnixTimestamp;
    use floodgate_metrics::{Metric, MetricValue};

    use crate::testutils::{AcceptingStore, BrokenStore, RejectingStore, StalledStore};

    use super::*;

    fn collection(len: usize) -> MetricsCollection {
        let mut collection = MetricsCollection::new();
        collection.add((0..len).map(|i| Metric {
            tenant_id: "836986".to_owned(),
            name: format!("metric.{i}"),
            timestamp: UnixTimestamp::from_millis(1_446_310_800_000),
            value: MetricValue::Int(i as i64),
            unit: None,
            ttl_seconds: 172_800,
        }));
        collection
    }

    #[tokio::test]
    async fn test_all_persisted() {
        let store = Arc::new(AcceptingStore::default());
        let processor = IngestProcessor::new(store.clone(), Duration::from_millis(100));

        let outcome = processor.submit(collection(3)).await;
        assert_eq!(outcome, BatchOutcome::AllPersisted);
        assert_eq!(store.batch_sizes(), vec![3]);
    }

    #[tokio::test]
    async fn test_single_failure_fails_batch() {
        let store = Arc::new(RejectingStore::new(1));
        let processor = IngestProcessor::new(store, Duration::from_millis(100));

        let outcome = processor.submit(collection(3)).await;
        assert_eq!(outcome, BatchOutcome::Failed);
    }

    #[tokio::test]
    async fn test_store_error_fails_batch() {
        let processor = IngestProcessor::new(Arc::new(BrokenStore), Duration::from_millis(100));

        let outcome = processor.submit(collection(1)).await;
        assert_eq!(outcome, BatchOutcome::Failed);
    }

    #[tokio::test]
    async fn test_deadline_elapsed() {
        let processor = IngestProcessor::new(Arc::new(StalledStore), Duration::from_millis(10));

        let outcome = processor.submit(collection(1)).await;
        assert_eq!(outcome, BatchOutcome::TimedOut);
    }
}
