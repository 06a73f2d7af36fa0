//! State needed by the handlers in this crate.
//!
//! The application keeps its own state struct and exposes these pieces
//! through `FromRef`, so the handlers here stay independent of it.

use standbook_core::auth::Authenticator;
use standbook_runtime::Broadcaster;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Limits of the realtime channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RealtimeLimits {
    /// Concurrent connections; further upgrades get 503
    pub max_connections: usize,
    /// Interval between protocol pings
    pub ping_interval: Duration,
    /// Connection closed after this long without a client frame
    pub idle_timeout: Duration,
}

impl Default for RealtimeLimits {
    fn default() -> Self {
        Self {
            max_connections: 1000,
            ping_interval: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(300),
        }
    }
}

/// Everything the realtime handler needs.
#[derive(Clone)]
pub struct RealtimeState {
    pub(crate) broadcaster: Broadcaster,
    pub(crate) authenticator: Arc<dyn Authenticator>,
    pub(crate) slots: Arc<Semaphore>,
    pub(crate) limits: RealtimeLimits,
}

impl RealtimeState {
    /// Realtime state over the shared broadcaster.
    #[must_use]
    pub fn new(
        broadcaster: Broadcaster,
        authenticator: Arc<dyn Authenticator>,
        limits: RealtimeLimits,
    ) -> Self {
        Self {
            broadcaster,
            authenticator,
            slots: Arc::new(Semaphore::new(limits.max_connections)),
            limits,
        }
    }

    /// Open connections.
    #[must_use]
    pub fn connections(&self) -> usize {
        self.limits
            .max_connections
            .saturating_sub(self.slots.available_permits())
    }
}
