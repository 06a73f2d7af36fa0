//! Prometheus metrics for reservations, broadcasts and background tasks.
//!
//! # Example
//!
//! ```rust,no_run
//! use standbook_runtime::metrics::MetricsRecorder;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut recorder = MetricsRecorder::new();
//! recorder.install()?;
//!
//! // Serve `recorder.render()` at GET /metrics
//! # Ok(())
//! # }
//! ```

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use standbook_core::EventName;
use std::time::Duration;
use thiserror::Error;

/// Errors from metrics setup.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build the exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install the global recorder
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Installs the Prometheus recorder and renders the scrape body.
///
/// The HTTP layer serves [`MetricsRecorder::render`]; no separate listener is
/// started.
#[derive(Default)]
pub struct MetricsRecorder {
    handle: Option<PrometheusHandle>,
}

impl MetricsRecorder {
    /// Recorder not yet installed.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Register metric descriptions and install the global recorder.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] if the exporter cannot be built or installed.
    /// A recorder already installed by an earlier call is tolerated and
    /// leaves this instance without a handle.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Prometheus recorder installed");
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                if message.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(message))
                }
            }
        }
    }

    /// Current metrics in Prometheus text format, `None` before install.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    describe_counter!(
        "reservation_transitions_total",
        "Committed reservation transitions, labelled by event"
    );
    describe_counter!(
        "reservation_conflicts_total",
        "Reservation attempts rejected because the space was taken"
    );
    describe_counter!(
        "reservation_expired_total",
        "Holds expired, labelled by source (lapse or sweep)"
    );
    describe_histogram!(
        "reservation_command_duration_seconds",
        "Time taken to run a reservation command end to end"
    );

    describe_counter!(
        "broadcast_sent_total",
        "Envelopes handed to at least one realtime connection"
    );
    describe_counter!(
        "broadcast_dropped_total",
        "Envelopes published while no realtime connection was open"
    );
    describe_gauge!("realtime_connections", "Open realtime connections");

    describe_counter!(
        "transient_retries_total",
        "Backoffs taken after a storage or expiry store outage"
    );
    describe_counter!(
        "transient_recoveries_total",
        "Expiry handling that succeeded after backing off"
    );
    describe_counter!(
        "transient_giveups_total",
        "Expiry handling abandoned until the next sweep"
    );
}

/// Reservation command metrics.
pub struct ReservationMetrics;

impl ReservationMetrics {
    /// Record a committed transition.
    pub fn record_transition(event: EventName) {
        counter!("reservation_transitions_total", "event" => event.as_str()).increment(1);
    }

    /// Record a create rejected by the single-active rule.
    pub fn record_conflict() {
        counter!("reservation_conflicts_total").increment(1);
    }

    /// Record an expired hold.
    pub fn record_expired(source: &'static str) {
        counter!("reservation_expired_total", "source" => source).increment(1);
    }

    /// Record the duration of a command.
    pub fn record_command(operation: &'static str, duration: Duration) {
        histogram!("reservation_command_duration_seconds", "operation" => operation)
            .record(duration.as_secs_f64());
    }
}

/// Realtime fan-out metrics.
pub struct BroadcastMetrics;

impl BroadcastMetrics {
    /// Record an envelope delivered to the channel.
    pub fn record_sent() {
        counter!("broadcast_sent_total").increment(1);
    }

    /// Record an envelope nobody was listening for.
    pub fn record_dropped() {
        counter!("broadcast_dropped_total").increment(1);
    }

    /// Record the number of open connections.
    #[allow(clippy::cast_precision_loss)] // connection counts are far below 2^52
    pub fn record_connections(count: usize) {
        gauge!("realtime_connections").set(count as f64);
    }
}

/// Backoff metrics for [`crate::retry::retry_transient`].
pub struct RetryMetrics;

impl RetryMetrics {
    /// One backoff taken.
    pub fn record_attempt() {
        counter!("transient_retries_total").increment(1);
    }

    /// Succeeded after at least one backoff.
    pub fn record_success() {
        counter!("transient_recoveries_total").increment(1);
    }

    /// Policy exhausted.
    pub fn record_exhausted() {
        counter!("transient_giveups_total").increment(1);
    }
}
