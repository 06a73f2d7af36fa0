//! Application state for the Standbook HTTP server.
//!
//! Contains every shared resource the handlers need. Web-crate extractors
//! and handlers pull their slice out through the `FromRef` impls below.

use axum::extract::FromRef;
use standbook_core::auth::Authenticator;
use standbook_runtime::{MetricsRecorder, Registry, ReservationService};
use standbook_web::RealtimeState;
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request; every field is a cheap handle.
#[derive(Clone)]
pub struct AppState {
    /// Reservation commands and queries
    pub service: ReservationService,

    /// Events, plans, spaces, zones and profiles
    pub registry: Registry,

    /// Bearer credential verification
    pub authenticator: Arc<dyn Authenticator>,

    /// Realtime channel state (broadcaster + connection slots)
    pub realtime: RealtimeState,

    /// Prometheus scrape source
    pub metrics: Arc<MetricsRecorder>,

    /// Hold placed on reservations created through the API
    pub hold_ttl: Duration,

    /// Longest hold a non-admin may request
    pub max_hold_ttl: Duration,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The registry shares `service`'s collaborators.
    #[must_use]
    pub fn new(
        service: ReservationService,
        authenticator: Arc<dyn Authenticator>,
        realtime: RealtimeState,
        metrics: Arc<MetricsRecorder>,
        hold_ttl: Duration,
        max_hold_ttl: Duration,
    ) -> Self {
        Self {
            registry: Registry::new(service.clone()),
            service,
            authenticator,
            realtime,
            metrics,
            hold_ttl,
            max_hold_ttl,
        }
    }
}

impl FromRef<AppState> for Arc<dyn Authenticator> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.authenticator.clone()
    }
}

impl FromRef<AppState> for ReservationService {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.service.clone()
    }
}

impl FromRef<AppState> for RealtimeState {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.realtime.clone()
    }
}

impl FromRef<AppState> for Arc<MetricsRecorder> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.metrics.clone()
    }
}
