//! Correlation id propagation.
//!
//! Each request gets an id taken from `X-Correlation-ID` when the client
//! sent a valid UUID, or a fresh one otherwise. The id is stored as a
//! [`CorrelationId`] extension, wraps the handler in an `http_request` span
//! and is echoed on the response.

use crate::extractors::CorrelationId;
use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Instrument;
use uuid::Uuid;

/// Header name for correlation ID.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// Middleware function for [`axum::middleware::from_fn`].
///
/// ```ignore
/// let app = Router::new()
///     .route("/api/reservations", post(create_reservation))
///     .layer(axum::middleware::from_fn(propagate_correlation_id));
/// ```
pub async fn propagate_correlation_id(mut request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value).ok())
        .unwrap_or_else(Uuid::new_v4);

    let span = tracing::info_span!(
        "http_request",
        correlation_id = %id,
        method = %request.method(),
        path = %request.uri().path(),
    );
    request.extensions_mut().insert(CorrelationId(id));

    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }
    response
}
