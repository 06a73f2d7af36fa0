//! Health and metrics endpoints.
//!
//! These endpoints are used by load balancers, orchestrators and Prometheus.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use standbook_runtime::{HealthReport, MetricsRecorder, ReservationService};
use std::sync::Arc;

/// Liveness probe.
///
/// Returns 200 OK while the process is serving. Dependencies are NOT checked.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Readiness probe: database and expiry store.
///
/// # Status Codes
///
/// - 200 OK: Healthy or Degraded
/// - 503 Service Unavailable: a dependency is unreachable
///
/// # Endpoint
///
/// ```text
/// GET /ready
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "checks": [
///     { "component": "database", "status": "healthy", "latency_ms": 2 },
///     { "component": "expiry_store", "status": "healthy", "latency_ms": 1 }
///   ],
///   "timestamp": "2025-03-01T10:00:00Z"
/// }
/// ```
pub async fn readiness(
    State(service): State<ReservationService>,
) -> (StatusCode, Json<HealthReport>) {
    let report = standbook_runtime::readiness(&service).await;

    let status = if report.is_ready() {
        StatusCode::OK
    } else {
        tracing::warn!(status = ?report.status, "Readiness check failed");
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(report))
}

/// Prometheus scrape endpoint. 404 when metrics are disabled.
///
/// # Endpoint
///
/// ```text
/// GET /metrics
/// ```
#[allow(clippy::unused_async)]
pub async fn metrics(State(recorder): State<Arc<MetricsRecorder>>) -> Response {
    match recorder.render() {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}
