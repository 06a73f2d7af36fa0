//! # Standbook Runtime
//!
//! Imperative shell around the reservation state machine in
//! `standbook-core`.
//!
//! ## Core Components
//!
//! - **ReservationService**: runs reservation commands in one unit of work
//!   each and broadcasts the outcome after commit
//! - **Registry**: events, plans, spaces, zones and profiles, including the
//!   admin `SetSpaceStatus` operation
//! - **Broadcaster**: realtime fan-out to every connected client
//! - **ExpiryListener / ReconciliationSweep**: background tasks turning lapsed
//!   holds into `EXPIRED` reservations
//!
//! ## Example
//!
//! ```ignore
//! use standbook_runtime::{Broadcaster, ExpiryListener, ReservationService};
//! use std::time::Duration;
//!
//! let service = ReservationService::new(gateway, expiry, Broadcaster::default(), clock);
//! let listener = ExpiryListener::new(service.clone()).start();
//!
//! let held = service
//!     .create_and_hold(space_id, Some(user_id), "Alice", Duration::from_secs(900))
//!     .await?;
//! service.confirm(held.reservation.id).await?;
//!
//! listener.stop().await;
//! ```

/// Realtime broadcast hub
pub mod broadcast;

/// Readiness checks
pub mod health;

/// Prometheus metrics for observability
pub mod metrics;

/// Catalogue and space status management
pub mod registry;

/// Backoff for transient failures
pub mod retry;

/// Reservation commands and queries
pub mod service;

/// Hold expiry background tasks
pub mod tasks;

pub use broadcast::Broadcaster;
pub use health::{HealthCheck, HealthReport, HealthStatus, readiness};
pub use metrics::{MetricsError, MetricsRecorder};
pub use registry::Registry;
pub use retry::{RetryPolicy, retry_transient};
pub use service::{
    Confirmation, ConfirmHook, ExpirySource, ReservationService, ReservationStatus,
};
pub use tasks::{ExpiryListener, ReconciliationSweep, TaskHandle};
