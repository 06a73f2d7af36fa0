//! # Standbook Testing
//!
//! Testing utilities and helpers for Standbook.
//!
//! This crate provides:
//! - Deterministic clocks
//! - In-memory implementations of the persistence gateway, expiry store and
//!   authenticator
//! - The [`ReducerTest`] given/when/then harness
//! - Record fixtures and proptest strategies
//!
//! ## Example
//!
//! ```ignore
//! use standbook_testing::{InMemoryExpiryStore, InMemoryGateway, fixtures, test_clock};
//!
//! #[tokio::test]
//! async fn test_hold_flow() {
//!     let gateway = InMemoryGateway::new();
//!     let space = fixtures::seed_space(&gateway).await;
//!     let service = ReservationService::new(gateway.as_dyn(), ...);
//!
//!     let created = service.create(space.id, Some(user), "Alice").await?;
//!     assert_eq!(created.reservation.state, ReservationState::Pending);
//! }
//! ```

use chrono::{DateTime, Utc};
use standbook_core::environment::Clock;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

pub mod fixtures;
pub mod mocks;
pub mod properties;
pub mod reducer_test;

pub use mocks::{InMemoryExpiryStore, InMemoryGateway, StaticAuthenticator};
pub use reducer_test::ReducerTest;

/// Fixed clock for deterministic tests
///
/// Always returns the same time, making tests reproducible.
///
/// # Example
///
/// ```
/// use standbook_testing::FixedClock;
/// use standbook_core::environment::Clock;
/// use chrono::Utc;
///
/// let clock = FixedClock::new(Utc::now());
/// let time1 = clock.now();
/// let time2 = clock.now();
/// assert_eq!(time1, time2); // Always the same!
/// ```
#[derive(Debug, Clone)]
pub struct FixedClock {
    time: DateTime<Utc>,
}

impl FixedClock {
    /// Create a new fixed clock with the given time
    #[must_use]
    pub const fn new(time: DateTime<Utc>) -> Self {
        Self { time }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.time
    }
}

/// Clock that only moves when told to.
///
/// Clones share the same time, so a test can keep a handle while the service
/// under test holds another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    millis: Arc<AtomicI64>,
}

impl ManualClock {
    /// Start at `time`.
    #[must_use]
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(time.timestamp_millis())),
        }
    }

    /// Move time forward.
    pub fn advance(&self, by: std::time::Duration) {
        let delta = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.millis.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

/// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
#[must_use]
pub fn test_clock() -> FixedClock {
    FixedClock::new(test_epoch())
}

/// 2025-01-01 00:00:00 UTC, the start of every test timeline.
#[must_use]
pub fn test_epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(1_735_689_600, 0).unwrap_or_default()
}

/// Install a `fmt` subscriber honouring `RUST_LOG`, once per process.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn test_manual_clock_advances_all_clones() {
        let clock = ManualClock::new(test_epoch());
        let handle = clock.clone();

        handle.advance(std::time::Duration::from_secs(30));

        assert_eq!(clock.now(), test_epoch() + chrono::Duration::seconds(30));
    }
}
