//! Axum integration for Standbook.
//!
//! This crate holds the HTTP plumbing shared by every Standbook binary. The
//! application crate owns the router and its state; this crate supplies the
//! pieces it is assembled from.
//!
//! # Request Flow
//!
//! 1. **Correlation layer** tags the request with an `X-Correlation-ID`
//! 2. **Guards** (`AuthUser`, `MaybeUser`, `RequireAdmin`) resolve the bearer
//!    token through the configured `Authenticator`
//! 3. **Handler** calls `ReservationService` / `Registry`
//! 4. **`AppError`** maps `ReservationError` onto a status code and a
//!    `{ code, message }` JSON body
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, routing::get};
//! use standbook_web::handlers::{health, websocket};
//! use standbook_web::propagate_correlation_id;
//!
//! let app = Router::new()
//!     .route("/health", get(health::health_check))
//!     .route("/ws", get(websocket::handle))
//!     .layer(axum::middleware::from_fn(propagate_correlation_id))
//!     .with_state(app_state);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod state;

pub use error::AppError;
pub use extractors::{AuthUser, BearerToken, CorrelationId, MaybeUser, RequireAdmin};
pub use middleware::{CORRELATION_ID_HEADER, propagate_correlation_id};
pub use state::{RealtimeLimits, RealtimeState};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
