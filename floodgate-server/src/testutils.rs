//! Helpers for in-crate tests.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use floodgate_config::Config;
use floodgate_metrics::MetricsCollection;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tower::ServiceExt;

use crate::service::ServiceState;
use crate::services::{MetricsStore, StoreError};

/// A config with a short persistence deadline, suitable for endpoint tests.
pub fn test_config() -> Arc<Config> {
    config_with(serde_json::json!({
        "ingestion": {"persist_timeout_ms": 100}
    }))
}

/// Builds a config from partial JSON values.
pub fn config_with(values: serde_json::Value) -> Arc<Config> {
    Arc::new(Config::from_json_value(values).unwrap())
}

/// Wires a service state around the given store.
pub fn test_state(store: Arc<dyn MetricsStore>, config: Arc<Config>) -> ServiceState {
    ServiceState::start(config, store)
}

/// Builds the full application router around the given store.
pub fn test_app(store: Arc<dyn MetricsStore>, config: Arc<Config>) -> Router {
    crate::make_app(test_state(store, config))
}

/// Posts a body to an ingestion route and returns status and body text.
pub async fn send_ingest(
    app: Router,
    uri: &str,
    tenant_id: Option<&str>,
    body: String,
) -> (StatusCode, String) {
    let mut builder = Request::builder().method("POST").uri(uri);
    if let Some(tenant_id) = tenant_id {
        builder = builder.header("tenantId", tenant_id);
    }

    let request = builder.body(Body::from(body)).unwrap();
    let response = app.oneshot(request).await.unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

/// A store that persists every metric and records what it saw.
#[derive(Debug, Default)]
pub struct AcceptingStore {
    batches: Mutex<Vec<Vec<u64>>>,
}

impl AcceptingStore {
    /// The size of each submitted batch, in submission order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().iter().map(Vec::len).collect()
    }

    /// The TTLs of all submitted metrics, in submission order.
    pub fn ttl_seconds(&self) -> Vec<u64> {
        self.batches.lock().iter().flatten().copied().collect()
    }
}

impl MetricsStore for AcceptingStore {
    fn apply(&self, collection: MetricsCollection) -> BoxFuture<'static, Result<Vec<bool>, StoreError>> {
        let ttls: Vec<u64> = collection.iter().map(|m| m.ttl_seconds()).collect();
        let len = ttls.len();
        self.batches.lock().push(ttls);

        Box::pin(std::future::ready(Ok(vec![true; len])))
    }
}

/// A store that reports one metric as not persisted.
#[derive(Debug)]
pub struct RejectingStore {
    failed_index: usize,
}

impl RejectingStore {
    /// Fails the metric at the given position of every batch.
    pub fn new(failed_index: usize) -> Self {
        Self { failed_index }
    }
}

impl MetricsStore for RejectingStore {
    fn apply(&self, collection: MetricsCollection) -> BoxFuture<'static, Result<Vec<bool>, StoreError>> {
        let failed_index = self.failed_index;
        let outcomes = (0..collection.len()).map(|i| i != failed_index).collect();

        Box::pin(std::future::ready(Ok(outcomes)))
    }
}

/// A store whose backend is unreachable.
#[derive(Debug)]
pub struct BrokenStore;

impl MetricsStore for BrokenStore {
    fn apply(&self, _collection: MetricsCollection) -> BoxFuture<'static, Result<Vec<bool>, StoreError>> {
        Box::pin(std::future::ready(Err(StoreError::Unavailable)))
    }
}

/// A store that never completes its submissions.
#[derive(Debug)]
pub struct StalledStore;

impl MetricsStore for StalledStore {
    fn apply(&self, _collection: MetricsCollection) -> BoxFuture<'static, Result<Vec<bool>, StoreError>> {
        Box::pin(std::future::pending())
    }
}
