//! The Floodgate ingestion server.
//!
//! This crate contains the HTTP surface of the metrics store's ingestion front door
//! and the services behind it. It accepts two wire formats, raw per-metric JSON
//! batches on `/v2.0/ingest` and pre-aggregated statsd-style bundles on
//! `/v2.0/ingest/aggregated`, validates and normalizes them into canonical metric
//! records, and submits them to the persistence layer under a strict time budget.
//!
//! # Path of a batch
//!
//! 1. The payload is decoded into unvalidated records. Syntactically broken bodies
//!    and shape mismatches are both answered with `400`.
//! 2. Validation filters out invalid metrics and accumulates structured errors.
//!    A batch is only rejected wholesale when no metric survives. Metrics whose
//!    collection time is old enough to endanger rollup correctness are reported to
//!    the [delayed metrics tracker](services::Tracker) as a side effect.
//! 3. The TTL enforcer overrides retention when the force-TTL policy is active.
//! 4. The surviving metrics are frozen into a collection and submitted to the
//!    [persistence collaborator](services::MetricsStore). The handler waits for the
//!    per-metric outcome under a deadline; a timed out wait does not cancel the
//!    in-flight submission and is answered with `202`.
//!
//! Handlers run directly on the server's I/O runtime and must never block; the
//! bounded persistence wait is the only suspension point with a deadline.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use floodgate_config::{Config, ConfigError};
use tower_http::catch_panic::CatchPanicLayer;

mod endpoints;
mod extractors;
mod middlewares;
mod service;
mod statsd;
#[cfg(test)]
mod testutils;

pub mod services;

pub use self::service::ServiceState;

use self::services::MetricsStore;

/// How long to wait for open connections when shutting down.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Indicates the type of failure of the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Binding or serving the socket failed.
    #[error("bind to interface failed")]
    BindFailed(#[from] std::io::Error),

    /// The server configuration is unusable.
    #[error("invalid server configuration")]
    Config(#[from] ConfigError),
}

/// Builds the axum application with all routes and middleware.
fn make_app(state: ServiceState) -> Router {
    Router::new()
        .route("/healthcheck", get(endpoints::health_check::handle))
        .route("/v2.0/ingest", endpoints::ingest::route(state.config()))
        .route(
            "/v2.0/ingest/aggregated",
            endpoints::aggregated::route(state.config()),
        )
        .layer(CatchPanicLayer::custom(middlewares::handle_panic))
        .with_state(state)
}

/// Runs the HTTP server until a shutdown signal arrives.
pub async fn serve(config: Arc<Config>, store: Arc<dyn MetricsStore>) -> Result<(), ServerError> {
    let addr = config.listen_addr()?;
    let state = ServiceState::start(config, store);
    let app = make_app(state);

    let handle = axum_server::Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    floodgate_log::info!("spawning http server");
    floodgate_log::info!("  listening on http://{addr}/");

    axum_server::bind(addr)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;

    floodgate_log::info!("http server shut down");
    Ok(())
}

/// Creates the server runtime and blocks on [`serve`].
pub fn run(config: Arc<Config>, store: Arc<dyn MetricsStore>) -> Result<(), ServerError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("floodgate-server")
        .enable_all()
        .build()?;

    runtime.block_on(serve(config, store))
}

async fn graceful_shutdown(handle: axum_server::Handle) {
    if tokio::signal::ctrl_c().await.is_ok() {
        floodgate_log::info!("shutdown signal received, draining connections");
        handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
    }
}
