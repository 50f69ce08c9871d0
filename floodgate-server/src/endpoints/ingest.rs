//! Handles raw per-metric JSON batch ingestion.

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, post};
use bytes::Bytes;
use floodgate_config::Config;
use floodgate_metrics::{
    IngestedMetric, MetricsCollection, ParseMetricsError, ValidatedBatch, parse_metrics,
    validate_metrics,
};
use floodgate_statsd::metric;

use crate::endpoints::common::{BadIngestRequest, build_response};
use crate::extractors::{ReceivedAt, TenantId};
use crate::service::ServiceState;
use crate::services::{BatchOutcome, RequestDescriptor};
use crate::statsd::{IngestCounters, IngestTimers};

const ROUTE: &str = "/v2.0/ingest";

async fn handle(
    state: ServiceState,
    received_at: ReceivedAt,
    tenant: TenantId,
    body: Bytes,
) -> Response {
    state.tracker().track(&RequestDescriptor {
        route: ROUTE,
        tenant_id: tenant.as_deref(),
    });

    let response = match process(&state, received_at, &tenant, &body).await {
        Ok(response) => response,
        Err(error) => error.into_response(),
    };

    state.tracker().track_response(ROUTE, response.status());
    response
}

async fn process(
    state: &ServiceState,
    received_at: ReceivedAt,
    tenant: &TenantId,
    body: &Bytes,
) -> Result<Response, BadIngestRequest> {
    let now = received_at.into_inner();

    let decoded = metric!(timer(IngestTimers::DecodeJson), { parse_metrics(body) });
    let raw_metrics = match decoded {
        Ok(raw_metrics) => raw_metrics,
        Err(error) => {
            log_decode_failure(&error);
            return Err(BadIngestRequest::Malformed(error));
        }
    };

    if raw_metrics.is_empty() {
        floodgate_log::warn!(
            tenant_id = tenant.as_deref().unwrap_or("-"),
            "batch contains no metrics",
        );
        return Err(BadIngestRequest::EmptyBatch);
    }

    let ValidatedBatch {
        metrics,
        errors,
        delayed,
    } = validate_metrics(
        raw_metrics,
        tenant.as_deref(),
        now,
        state.ingestion_window(),
        state.delay_threshold(),
        state.config().ingestion_ttl_seconds(),
    );

    metric!(counter(IngestCounters::MetricsDropped) += errors.len() as i64, route = ROUTE);

    if let Some(tenant_id) = tenant.as_deref() {
        state.tracker().track_delayed(tenant_id, delayed);
    }

    if metrics.is_empty() {
        floodgate_log::warn!(
            tenant_id = tenant.as_deref().unwrap_or("-"),
            errors = errors.len(),
            "no valid metrics in batch",
        );
        return Err(BadIngestRequest::NoValidMetrics(errors));
    }

    let mut metrics: Vec<IngestedMetric> = metrics.into_iter().map(Into::into).collect();
    state.ttl_enforcer().apply(&mut metrics);

    let mut collection = MetricsCollection::new();
    collection.add(metrics);

    let outcome = metric!(timer(IngestTimers::Persist), {
        state.processor().submit(collection).await
    });

    Ok(match outcome {
        BatchOutcome::AllPersisted if errors.is_empty() => {
            build_response(StatusCode::OK, [], Bytes::new())
        }
        // Some entries failed validation but everything else persisted.
        BatchOutcome::AllPersisted => build_response(StatusCode::MULTI_STATUS, [], Bytes::new()),
        BatchOutcome::Failed => build_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            [],
            "Persisted failed for metrics",
        ),
        BatchOutcome::TimedOut => {
            build_response(StatusCode::ACCEPTED, [], "Timed out persisting metrics")
        }
    })
}

pub(crate) fn log_decode_failure(error: &ParseMetricsError) {
    metric!(counter(IngestCounters::DecodeFailed) += 1);

    // Syntactically broken senders and schema mismatches are different problems;
    // keep them apart in the logs.
    match error {
        ParseMetricsError::InvalidJson(source) => {
            floodgate_log::warn!(
                error = source as &dyn std::error::Error,
                "cannot parse content",
            );
        }
        ParseMetricsError::InvalidShape(source) => {
            floodgate_log::warn!(
                error = source as &dyn std::error::Error,
                "payload has unexpected shape",
            );
        }
    }
}

pub fn route(config: &Config) -> MethodRouter<ServiceState> {
    post(handle).route_layer(DefaultBodyLimit::max(config.max_payload_bytes()))
}
