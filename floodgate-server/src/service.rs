use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use floodgate_config::Config;
use floodgate_metrics::{DelayThreshold, IngestionWindow};

use crate::services::{IngestProcessor, MetricsStore, Tracker, TtlEnforcer};

#[derive(Debug)]
struct StateInner {
    config: Arc<Config>,
    processor: IngestProcessor,
    tracker: Tracker,
    ttl_enforcer: TtlEnforcer,
    ingestion_window: IngestionWindow,
    delay_threshold: DelayThreshold,
}

/// Server state shared by all request handlers.
///
/// Constructed once at the composition root; the tracker, TTL enforcer and
/// processor live here with single-instance-per-process semantics instead of
/// behind global singletons.
#[derive(Clone, Debug)]
pub struct ServiceState {
    inner: Arc<StateInner>,
}

impl ServiceState {
    /// Wires all services from the given configuration and persistence store.
    pub fn start(config: Arc<Config>, store: Arc<dyn MetricsStore>) -> Self {
        let inner = StateInner {
            processor: IngestProcessor::new(store, config.persist_timeout()),
            tracker: Tracker::default(),
            ttl_enforcer: TtlEnforcer::from_config(&config),
            ingestion_window: config.ingestion_window(),
            delay_threshold: config.delay_threshold(),
            config,
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Returns the process configuration.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Returns the ingestion processor.
    pub fn processor(&self) -> &IngestProcessor {
        &self.inner.processor
    }

    /// Returns the delayed metrics tracker.
    pub fn tracker(&self) -> &Tracker {
        &self.inner.tracker
    }

    /// Returns the TTL enforcer.
    pub fn ttl_enforcer(&self) -> &TtlEnforcer {
        &self.inner.ttl_enforcer
    }

    /// The tolerated collection timestamp window.
    pub fn ingestion_window(&self) -> &IngestionWindow {
        &self.inner.ingestion_window
    }

    /// The threshold after which a metric counts as delayed.
    pub fn delay_threshold(&self) -> &DelayThreshold {
        &self.inner.delay_threshold
    }
}

impl FromRequestParts<ServiceState> for ServiceState {
    type Rejection = Infallible;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &ServiceState,
    ) -> Result<Self, Self::Rejection> {
        Ok(state.clone())
    }
}
