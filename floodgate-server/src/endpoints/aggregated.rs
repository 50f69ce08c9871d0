//! Handles pre-aggregated bundle ingestion.

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, post};
use bytes::Bytes;
use floodgate_config::Config;
use floodgate_metrics::{
    AggregatedPayload, DelayedMetric, IngestedMetric, MetricsCollection, convert_payload,
};
use floodgate_statsd::metric;

use crate::endpoints::common::{BadIngestRequest, build_response};
use crate::endpoints::ingest::log_decode_failure;
use crate::extractors::ReceivedAt;
use crate::service::ServiceState;
use crate::services::{BatchOutcome, RequestDescriptor};
use crate::statsd::IngestTimers;

const ROUTE: &str = "/v2.0/ingest/aggregated";

async fn handle(state: ServiceState, received_at: ReceivedAt, body: Bytes) -> Response {
    // Tenant identity is embedded in the payload body for this format.
    state.tracker().track(&RequestDescriptor {
        route: ROUTE,
        tenant_id: None,
    });

    let response = match process(&state, received_at, &body).await {
        Ok(response) => response,
        Err(error) => error.into_response(),
    };

    state.tracker().track_response(ROUTE, response.status());
    response
}

async fn process(
    state: &ServiceState,
    received_at: ReceivedAt,
    body: &Bytes,
) -> Result<Response, BadIngestRequest> {
    let now = received_at.into_inner();

    let decoded = metric!(timer(IngestTimers::DecodeJson), {
        AggregatedPayload::parse(body)
    });
    let payload = match decoded {
        Ok(payload) => payload,
        Err(error) => {
            log_decode_failure(&error);
            return Err(BadIngestRequest::Malformed(error));
        }
    };

    // Delayed classification is independent of the validation outcome.
    if let Some(delay) = payload.delay(now, state.delay_threshold()) {
        if !payload.tenant_id.is_empty() {
            state.tracker().track_delayed(
                &payload.tenant_id,
                vec![DelayedMetric {
                    name: payload.identifier(),
                    delay_millis: delay.as_millis() as u64,
                }],
            );
        }
    }

    // All statistics share the bundle's collection timestamp, so a validation
    // error here fails the whole bundle before any conversion is attempted.
    let errors = payload.validation_errors(now, state.ingestion_window());
    if !errors.is_empty() {
        return Err(BadIngestRequest::InvalidBundle(errors));
    }

    let converted = match convert_payload(
        &payload,
        state.config().ingestion_ttl_seconds(),
        state.config().flush_interval_millis(),
    ) {
        Ok(converted) => converted,
        Err(error) => {
            floodgate_log::error!(
                error = &error as &dyn std::error::Error,
                bundle = %payload.identifier(),
                "failed converting bundle",
            );
            return Err(BadIngestRequest::ConvertFailed(error));
        }
    };

    let mut metrics: Vec<IngestedMetric> = converted.into_iter().map(Into::into).collect();
    state.ttl_enforcer().apply(&mut metrics);

    let mut collection = MetricsCollection::new();
    collection.add(metrics);

    let outcome = metric!(timer(IngestTimers::Persist), {
        state.processor().submit(collection).await
    });

    // No multi-status on this path: statistics of one bundle share lineage, so
    // persistence is all-or-nothing.
    Ok(match outcome {
        BatchOutcome::AllPersisted => build_response(StatusCode::OK, [], Bytes::new()),
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

pub fn route(config: &Config) -> MethodRouter<ServiceState> {
    post(handle).route_layer(DefaultBodyLimit::max(config.max_payload_bytes()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use similar_asserts::assert_eq;

    use crate::endpoints::common::ERROR_HEADER;
    use crate::testutils::{
        AcceptingStore, RejectingStore, StalledStore, send_ingest, test_app, test_config,
    };

    fn bundle_json(timestamp: u64) -> String {
        format!(
            r#"{{
                "tenantId": "836986",
                "checkId": "ch0001",
                "timestamp": {timestamp},
                "flushInterval": 15000,
                "counters": [
                    {{"name": "visits", "value": 4, "rate": 0.26}},
                    {{"name": "carts", "value": 12345}}
                ],
                "gauges": [{{"name": "load.one", "value": 2.321}}],
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
                "enums": [{{"name": "status", "enumValues": {{"ok": 23}}}}]
            }}"#
        )
    }

    fn now_millis() -> u64 {
        floodgate_common::UnixTimestamp::now().as_millis()
    }

    #[tokio::test]
    async fn test_valid_bundle_returns_200() {
        let store = Arc::new(AcceptingStore::default());
        let app = test_app(store.clone(), test_config());

        let (status, body) =
            send_ingest(app, "/v2.0/ingest/aggregated", None, bundle_json(now_millis())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "");
        // 2 counters + 1 gauge + 1 set + 1 timer + 1 enum.
        assert_eq!(store.batch_sizes(), vec![6]);
    }

    #[tokio::test]
    async fn test_skewed_bundle_returns_400_without_persistence() {
        let store = Arc::new(AcceptingStore::default());
        let app = test_app(store.clone(), test_config());

        let future = now_millis() + 600_000 + 5_000;
        let (status, body) =
            send_ingest(app, "/v2.0/ingest/aggregated", None, bundle_json(future)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.starts_with(ERROR_HEADER));
        assert!(body.contains("is in the future by"));
        assert!(store.batch_sizes().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_bundle_returns_400() {
        let app = test_app(Arc::new(AcceptingStore::default()), test_config());

        let (status, body) = send_ingest(
            app,
            "/v2.0/ingest/aggregated",
            None,
            "[1, 2, 3]".to_owned(),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("invalid metrics payload"));
    }

    #[tokio::test]
    async fn test_single_statistic_failure_fails_bundle() {
        let app = test_app(Arc::new(RejectingStore::new(3)), test_config());

        let (status, body) =
            send_ingest(app, "/v2.0/ingest/aggregated", None, bundle_json(now_millis())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Persisted failed for metrics");
    }

    #[tokio::test]
    async fn test_timeout_returns_202() {
        let app = test_app(Arc::new(StalledStore), test_config());

        let (status, body) =
            send_ingest(app, "/v2.0/ingest/aggregated", None, bundle_json(now_millis())).await;

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body, "Timed out persisting metrics");
    }

    #[tokio::test]
    async fn test_delayed_bundle_is_tracked_even_when_invalid() {
        let store = Arc::new(AcceptingStore::default());
        let state = crate::testutils::test_state(store, test_config());
        let app = crate::make_app(state.clone());

        // Old enough to be both outside the past window and delayed.
        let ancient = now_millis() - 259_200_000 - 5_000;
        let (status, _) =
            send_ingest(app, "/v2.0/ingest/aggregated", None, bundle_json(ancient)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let delayed = state.tracker().delayed_metrics();
        assert_eq!(delayed["836986"][0].name, "836986.ch0001");
    }
}
