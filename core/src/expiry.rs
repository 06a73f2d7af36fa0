//! Expiry store abstraction.
//!
//! The expiry store keeps one ephemeral marker per held reservation. When a
//! marker lapses without being refreshed or removed, its key is delivered on
//! the stream returned by [`ExpiryStore::subscribe`].
//!
//! Delivery is at-least-once while a subscription is open and lost while it is
//! not; consumers must treat a lapse as a hint and re-read authoritative state.

use crate::error::ReservationError;
use crate::types::ReservationId;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Boxed future returned by expiry store operations.
pub type ExpiryFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ExpiryError>> + Send + 'a>>;

/// Stream of lapsed keys.
pub type LapseStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Default namespace for hold markers.
pub const DEFAULT_KEY_PREFIX: &str = "reservation:";

/// Errors that can occur in expiry store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpiryError {
    /// The store cannot be reached
    #[error("expiry store unavailable: {0}")]
    Unavailable(String),

    /// Lapse notifications cannot be subscribed to
    #[error("expiry subscription failed: {0}")]
    Subscription(String),
}

impl From<ExpiryError> for ReservationError {
    fn from(error: ExpiryError) -> Self {
        Self::Unavailable(error.to_string())
    }
}

/// Remaining lifetime of a marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeRemaining {
    /// Marker lapses after this long
    Remaining(Duration),
    /// Marker exists but never lapses
    NoTtl,
    /// No marker
    Absent,
}

impl TimeRemaining {
    /// Seconds in the `-1` (no ttl) / `-2` (absent) convention used by
    /// diagnostics endpoints.
    #[must_use]
    pub fn as_seconds(self) -> i64 {
        match self {
            Self::Remaining(d) => i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
            Self::NoTtl => -1,
            Self::Absent => -2,
        }
    }
}

/// Time-to-live key facility.
pub trait ExpiryStore: Send + Sync {
    /// Create or overwrite a marker lapsing after `ttl`.
    fn set<'a>(&'a self, key: &'a str, ttl: Duration) -> ExpiryFuture<'a, ()>;

    /// Remove a marker; removing an absent marker succeeds.
    fn remove<'a>(&'a self, key: &'a str) -> ExpiryFuture<'a, ()>;

    /// Whether a marker is live.
    fn exists<'a>(&'a self, key: &'a str) -> ExpiryFuture<'a, bool>;

    /// Remaining lifetime of a marker.
    fn time_remaining<'a>(&'a self, key: &'a str) -> ExpiryFuture<'a, TimeRemaining>;

    /// Open a lapse subscription.
    ///
    /// The stream ends when the underlying channel is lost; callers
    /// resubscribe.
    fn subscribe(&self) -> ExpiryFuture<'_, LapseStream>;

    /// Cheap liveness probe.
    fn ping(&self) -> ExpiryFuture<'_, ()>;
}

/// Maps reservation ids to marker keys and back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HoldKeys {
    prefix: String,
}

impl Default for HoldKeys {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX)
    }
}

impl HoldKeys {
    /// Keys of the form `{prefix}{reservation_id}`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Namespace prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Marker key of a reservation.
    #[must_use]
    pub fn key(&self, id: ReservationId) -> String {
        format!("{}{id}", self.prefix)
    }

    /// Reservation a key belongs to, if the key is in this namespace.
    #[must_use]
    pub fn reservation_id(&self, key: &str) -> Option<ReservationId> {
        key.strip_prefix(&self.prefix)
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .map(ReservationId::from_uuid)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn keys_round_trip_within_namespace() {
        let keys = HoldKeys::default();
        let id = ReservationId::new();

        let key = keys.key(id);

        assert!(key.starts_with("reservation:"));
        assert_eq!(keys.reservation_id(&key), Some(id));
    }

    #[test]
    fn foreign_keys_are_ignored() {
        let keys = HoldKeys::default();

        assert_eq!(keys.reservation_id("auth:session:abc"), None);
        assert_eq!(keys.reservation_id("reservation:not-a-uuid"), None);
    }

    #[test]
    fn time_remaining_uses_sentinel_seconds() {
        assert_eq!(TimeRemaining::Remaining(Duration::from_secs(12)).as_seconds(), 12);
        assert_eq!(TimeRemaining::NoTtl.as_seconds(), -1);
        assert_eq!(TimeRemaining::Absent.as_seconds(), -2);
    }
}
