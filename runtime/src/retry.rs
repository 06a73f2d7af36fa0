//! Exponential backoff for transient storage and expiry store failures.
//!
//! Only [`ReservationError::Unavailable`] is worth retrying; every other
//! error is a decision about the data and fails immediately.
//!
//! # Example
//!
//! ```ignore
//! use standbook_runtime::retry::{RetryPolicy, retry_transient};
//!
//! let policy = RetryPolicy::builder().max_retries(5).build();
//! let expired = retry_transient(&policy, || service.handle_expiry(id, source)).await?;
//! ```

use crate::metrics::RetryMetrics;
use standbook_core::ReservationError;
use std::future::Future;
use std::time::Duration;

/// How often and how patiently to retry.
///
/// Defaults: 3 retries, first delay 100ms doubling up to 30s.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_retries: usize,
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RetryPolicy {
    /// Builder starting from the defaults.
    #[must_use]
    pub const fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder(Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        })
    }

    /// Retries after the first attempt.
    #[must_use]
    pub const fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Delay before retry number `attempt` (zero-based).
    ///
    /// `initial_delay * multiplier^attempt`, capped at `max_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs).map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder(RetryPolicy);

impl RetryPolicyBuilder {
    /// Retries after the first attempt; zero disables retrying.
    #[must_use]
    pub const fn max_retries(mut self, max_retries: usize) -> Self {
        self.0.max_retries = max_retries;
        self
    }

    /// Delay before the first retry.
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.0.initial_delay = delay;
        self
    }

    /// Upper bound on any single delay.
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.0.max_delay = delay;
        self
    }

    /// Growth factor between consecutive delays.
    #[must_use]
    pub const fn multiplier(mut self, multiplier: f64) -> Self {
        self.0.multiplier = multiplier;
        self
    }

    /// Finish the policy.
    #[must_use]
    pub const fn build(self) -> RetryPolicy {
        self.0
    }
}

/// Run `operation`, retrying while it fails with a retryable error.
///
/// # Errors
///
/// The first non-retryable error, or the last `Unavailable` once the policy
/// is exhausted.
pub async fn retry_transient<F, Fut, T>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, ReservationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ReservationError>>,
{
    let mut attempt = 0;
    loop {
        let error = match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    RetryMetrics::record_success();
                    tracing::info!(attempt, "Recovered after retry");
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        if !error.is_retryable() {
            return Err(error);
        }
        if attempt >= policy.max_retries {
            RetryMetrics::record_exhausted();
            tracing::error!(attempt, error = %error, "Giving up after retries");
            return Err(error);
        }

        let delay = policy.delay_for_attempt(attempt);
        RetryMetrics::record_attempt();
        tracing::warn!(
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %error,
            "Transient failure, backing off"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use standbook_core::ConflictKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_delay_grows_then_caps() {
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_millis(250))
            .multiplier(3.0)
            .max_delay(Duration::from_secs(5))
            .build();

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(250));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(2250));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(5));
        assert_eq!(policy.delay_for_attempt(usize::MAX), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_outage_is_ridden_out() {
        let calls = AtomicUsize::new(0);

        let result = retry_transient(&RetryPolicy::default(), || {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if call < 2 {
                    Err(ReservationError::Unavailable("pool timed out".to_string()))
                } else {
                    Ok(call)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_policy_returns_last_error() {
        let calls = AtomicUsize::new(0);
        let policy = RetryPolicy::builder().max_retries(1).build();

        let result: Result<(), _> = retry_transient(&policy, || {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(ReservationError::Unavailable(format!("down {call}"))) }
        })
        .await;

        assert_eq!(
            result,
            Err(ReservationError::Unavailable("down 1".to_string()))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_business_errors_are_not_retried() {
        let calls = AtomicUsize::new(0);

        let result: Result<(), _> = retry_transient(&RetryPolicy::default(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ReservationError::Conflict(ConflictKind::Pending)) }
        })
        .await;

        assert_eq!(result, Err(ReservationError::Conflict(ConflictKind::Pending)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
