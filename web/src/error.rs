//! HTTP rendering of reservation errors.
//!
//! Every failure leaves the server as `{ "code": ..., "message": ... }` with
//! the status picked in [`AppError::from`]. Internal errors keep their cause
//! for the log and show the client a generic message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use standbook_core::{ReservationError, auth::AuthError};
use std::fmt;

/// Error returned by every handler.
///
/// ```ignore
/// async fn handler(State(state): State<AppState>, Path(id): Path<Uuid>) -> WebResult<Json<Space>> {
///     Ok(Json(state.registry.space(SpaceId::from_uuid(id)).await?))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
    /// Logged, never sent
    source: Option<anyhow::Error>,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying cause for logging.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// HTTP status of the response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable code of the response.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }

    /// 401: no usable session.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    /// 403: authenticated but not allowed.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    /// 403 returned when a user without a complete profile tries to reserve.
    #[must_use]
    pub fn profile_incomplete() -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            "PROFILE_INCOMPLETE",
            "Add an email address to your profile before reserving a space",
        )
    }

    /// 503: a backing service is down or saturated.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| &**source as &(dyn std::error::Error + 'static))
    }
}

impl From<ReservationError> for AppError {
    fn from(error: ReservationError) -> Self {
        let (status, code) = match error {
            ReservationError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ReservationError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ReservationError::InvalidState { .. } => (StatusCode::BAD_REQUEST, "INVALID_STATE"),
            ReservationError::Validation(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ReservationError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ReservationError::Unauthenticated => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ReservationError::Unavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE")
            }
            ReservationError::Internal(_) => {
                return Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "An internal error occurred",
                )
                .with_source(anyhow::Error::new(error));
            }
        };
        Self::new(status, code, error.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(error: AuthError) -> Self {
        ReservationError::from(error).into()
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            let cause = self.source.as_ref().map(ToString::to_string);
            tracing::error!(
                status = %self.status,
                code = self.code,
                message = %self.message,
                cause = cause.as_deref().unwrap_or("-"),
                "Request failed"
            );
        }

        let body = ErrorBody {
            code: self.code,
            message: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}
