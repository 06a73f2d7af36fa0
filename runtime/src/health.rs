//! Readiness reporting for the persistence gateway and the expiry store.

use crate::service::ReservationService;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Probes slower than this report the component as degraded.
const SLOW_PROBE: Duration = Duration::from_millis(500);

/// Component status, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Answered promptly
    Healthy,
    /// Answered, but slower than `SLOW_PROBE`
    Degraded,
    /// Did not answer
    Unhealthy,
}

/// Outcome of probing one collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    /// `database` or `expiry_store`
    pub component: &'static str,
    /// Probe result
    pub status: HealthStatus,
    /// Why the component is not healthy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Probe latency in milliseconds
    pub latency_ms: u64,
}

/// Body of `GET /ready`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Worst status among `checks`
    pub status: HealthStatus,
    /// One entry per collaborator
    pub checks: Vec<HealthCheck>,
    /// When the probes finished
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl HealthReport {
    /// Aggregate `checks` into a report stamped now.
    #[must_use]
    pub fn new(checks: Vec<HealthCheck>) -> Self {
        let status = checks
            .iter()
            .map(|check| check.status)
            .max()
            .unwrap_or(HealthStatus::Healthy);
        Self {
            status,
            checks,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Whether the service can take traffic; degraded still counts.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status != HealthStatus::Unhealthy
    }
}

/// Probe both collaborators of `service` concurrently.
pub async fn readiness(service: &ReservationService) -> HealthReport {
    let gateway = probe("database", async { service.gateway().ping().await.map_err(|e| e.to_string()) });
    let expiry = probe("expiry_store", async {
        service.expiry_store().ping().await.map_err(|e| e.to_string())
    });
    let (gateway, expiry) = tokio::join!(gateway, expiry);

    let report = HealthReport::new(vec![gateway, expiry]);
    if report.status != HealthStatus::Healthy {
        tracing::warn!(status = ?report.status, "Readiness check not healthy");
    }
    report
}

async fn probe<F>(component: &'static str, ping: F) -> HealthCheck
where
    F: std::future::Future<Output = Result<(), String>>,
{
    let started = Instant::now();
    let outcome = ping.await;
    let elapsed = started.elapsed();
    let (status, message) = match outcome {
        Ok(()) if elapsed > SLOW_PROBE => (HealthStatus::Degraded, Some("slow response".to_string())),
        Ok(()) => (HealthStatus::Healthy, None),
        Err(error) => (HealthStatus::Unhealthy, Some(error)),
    };
    HealthCheck {
        component,
        status,
        message,
        latency_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
    }
}
