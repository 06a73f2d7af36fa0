//! Background tasks that expire lapsed holds.
//!
//! - [`ExpiryListener`] follows the expiry store's lapse notifications.
//! - [`ReconciliationSweep`] periodically expires overdue holds whose
//!   notification was lost.
//!
//! Both hand reservation ids to [`ReservationService::handle_expiry`], which
//! re-reads authoritative state, so duplicate or stale signals are harmless.

use crate::retry::{RetryPolicy, retry_transient};
use crate::service::{ExpirySource, ReservationService};
use futures::StreamExt;
use standbook_core::{ReservationError, ReservationId};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Lapsed ids buffered between the subscription and the worker.
const LAPSE_BUFFER: usize = 1024;

/// Handle to a running background task.
///
/// Dropping the handle also stops the task, without waiting for it.
#[derive(Debug)]
pub struct TaskHandle {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl TaskHandle {
    fn spawn<F, Fut>(name: &'static str, task: F) -> Self
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let (shutdown, signal) = watch::channel(false);
        let join = tokio::spawn(task(signal));
        tracing::info!(task = name, "Background task started");
        Self {
            name,
            shutdown,
            join,
        }
    }

    /// Signal the task and wait for it to finish its current item.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(error) = self.join.await {
            tracing::error!(task = self.name, error = %error, "Background task panicked");
        } else {
            tracing::info!(task = self.name, "Background task stopped");
        }
    }

    /// Whether the task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Follows lapse notifications and expires the matching holds.
///
/// The subscription runs in one task and forwards reservation ids over a
/// channel to a worker task, so a slow expiry never stalls the subscription.
/// A dropped or failed subscription is re-established with exponential
/// backoff; lapses published while it is down are left to the sweep.
#[derive(Clone)]
pub struct ExpiryListener {
    service: ReservationService,
    policy: RetryPolicy,
}

impl ExpiryListener {
    /// Listener expiring holds through `service`.
    #[must_use]
    pub fn new(service: ReservationService) -> Self {
        Self {
            service,
            policy: RetryPolicy::builder()
                .max_retries(3)
                .initial_delay(Duration::from_millis(250))
                .max_delay(Duration::from_secs(30))
                .build(),
        }
    }

    /// Backoff for resubscribing and for retrying transient expiry failures.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Spawn the subscription and worker tasks.
    #[must_use]
    pub fn start(self) -> TaskHandle {
        TaskHandle::spawn("expiry_listener", move |shutdown| async move {
            let (ids, lapsed) = mpsc::channel(LAPSE_BUFFER);
            let worker = tokio::spawn(expire_lapsed(
                self.service.clone(),
                self.policy.clone(),
                lapsed,
            ));

            self.follow(ids, shutdown).await;

            // The worker drains what was already forwarded, then exits.
            if let Err(error) = worker.await {
                tracing::error!(error = %error, "Expiry worker panicked");
            }
        })
    }

    async fn follow(&self, ids: mpsc::Sender<ReservationId>, mut shutdown: watch::Receiver<bool>) {
        let store = self.service.expiry_store();
        let keys = self.service.keys();
        let mut attempt = 0;

        'subscribe: loop {
            let subscription = tokio::select! {
                _ = shutdown.changed() => break 'subscribe,
                subscription = store.subscribe() => subscription,
            };

            match subscription {
                Ok(mut lapses) => {
                    attempt = 0;
                    tracing::info!(prefix = keys.prefix(), "Subscribed to hold lapses");
                    loop {
                        tokio::select! {
                            _ = shutdown.changed() => break 'subscribe,
                            lapse = lapses.next() => match lapse {
                                Some(key) => {
                                    let Some(id) = keys.reservation_id(&key) else {
                                        tracing::trace!(%key, "Ignoring lapse outside the hold namespace");
                                        continue;
                                    };
                                    tracing::debug!(reservation_id = %id, "Hold marker lapsed");
                                    if ids.send(id).await.is_err() {
                                        break 'subscribe;
                                    }
                                }
                                None => {
                                    tracing::warn!("Lapse subscription closed, resubscribing");
                                    break;
                                }
                            },
                        }
                    }
                }
                Err(error) => {
                    tracing::warn!(attempt, error = %error, "Lapse subscription failed");
                }
            }

            let delay = self.policy.delay_for_attempt(attempt);
            attempt += 1;
            tokio::select! {
                _ = shutdown.changed() => break 'subscribe,
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}

async fn expire_lapsed(
    service: ReservationService,
    policy: RetryPolicy,
    mut lapsed: mpsc::Receiver<ReservationId>,
) {
    while let Some(reservation_id) = lapsed.recv().await {
        let result = retry_transient(&policy, || {
            service.handle_expiry(reservation_id, ExpirySource::Lapse)
        })
        .await;
        if let Err(error) = result {
            tracing::warn!(
                %reservation_id,
                error = %error,
                "Could not expire lapsed hold, leaving it to the sweep"
            );
        }
    }
}

/// Expires PENDING holds whose deadline passed without a live marker.
///
/// Runs once when started and then every `interval`.
#[derive(Clone)]
pub struct ReconciliationSweep {
    service: ReservationService,
    interval: Duration,
    policy: RetryPolicy,
}

impl ReconciliationSweep {
    /// Sweep through `service` every `interval`.
    #[must_use]
    pub fn new(service: ReservationService, interval: Duration) -> Self {
        Self {
            service,
            interval: interval.max(Duration::from_secs(1)),
            policy: RetryPolicy::builder().max_retries(2).build(),
        }
    }

    /// Backoff for transient failures on individual holds.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// One pass; returns how many holds were expired.
    ///
    /// A hold that cannot be expired is logged and retried on the next pass.
    ///
    /// # Errors
    ///
    /// `Unavailable` if the overdue holds cannot be listed.
    pub async fn run_once(&self) -> Result<usize, ReservationError> {
        let overdue = self.service.overdue_holds().await?;
        let candidates = overdue.len();
        let mut expired = 0;

        for reservation in overdue {
            let result = retry_transient(&self.policy, || {
                self.service.handle_expiry(reservation.id, ExpirySource::Sweep)
            })
            .await;
            match result {
                Ok(Some(_)) => expired += 1,
                Ok(None) => {}
                Err(error) => tracing::warn!(
                    reservation_id = %reservation.id,
                    error = %error,
                    "Sweep could not expire hold"
                ),
            }
        }

        if expired > 0 {
            tracing::info!(candidates, expired, "Reconciliation sweep expired overdue holds");
        } else {
            tracing::debug!(candidates, "Reconciliation sweep found nothing to expire");
        }
        Ok(expired)
    }

    /// Spawn the periodic sweep.
    #[must_use]
    pub fn start(self) -> TaskHandle {
        TaskHandle::spawn("reconciliation_sweep", move |mut shutdown| async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        if let Err(error) = self.run_once().await {
                            tracing::warn!(error = %error, "Reconciliation sweep failed");
                        }
                    }
                }
            }
        })
    }
}
