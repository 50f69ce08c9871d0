use axum::Json;
use axum::response::IntoResponse;
use serde::Serialize;

#[derive(Serialize)]
struct HealthCheckResponse {
    is_healthy: bool,
}

/// Liveness probe for load balancers and process supervisors.
pub async fn handle() -> impl IntoResponse {
    Json(HealthCheckResponse { is_healthy: true })
}
