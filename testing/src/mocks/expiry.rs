//! In-memory expiry store driven by tokio timers.
//!
//! Works with `tokio::time::pause()`: advancing the paused clock past a
//! marker's deadline makes it lapse.

use standbook_core::expiry::{ExpiryError, ExpiryFuture, ExpiryStore, LapseStream, TimeRemaining};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct Marker {
    deadline: Option<Instant>,
    generation: u64,
}

#[derive(Debug)]
struct Inner {
    markers: Mutex<HashMap<String, Marker>>,
    lapses: broadcast::Sender<String>,
    generation: AtomicU64,
    unavailable: AtomicBool,
}

/// In-memory expiry store.
///
/// Lapses are published only to subscriptions open at lapse time, like a
/// keyspace notification channel.
#[derive(Debug, Clone)]
pub struct InMemoryExpiryStore {
    inner: Arc<Inner>,
}

impl Default for InMemoryExpiryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryExpiryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        let (lapses, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Inner {
                markers: Mutex::new(HashMap::new()),
                lapses,
                generation: AtomicU64::new(0),
                unavailable: AtomicBool::new(false),
            }),
        }
    }

    /// Shared trait object over the same markers.
    #[must_use]
    pub fn as_dyn(&self) -> Arc<dyn ExpiryStore> {
        Arc::new(self.clone())
    }

    /// Make every operation fail with [`ExpiryError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Create a marker that never lapses.
    pub async fn set_persistent(&self, key: &str) {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.markers.lock().await.insert(
            key.to_string(),
            Marker {
                deadline: None,
                generation,
            },
        );
    }

    /// Lapse a marker immediately, as if its deadline had passed.
    ///
    /// Returns whether a marker existed.
    pub async fn lapse_now(&self, key: &str) -> bool {
        let removed = self.inner.markers.lock().await.remove(key).is_some();
        if removed {
            let _ = self.inner.lapses.send(key.to_string());
        }
        removed
    }

    /// Drop a marker without publishing a lapse, as if the notification was lost.
    pub async fn lose(&self, key: &str) {
        self.inner.markers.lock().await.remove(key);
    }

    /// Keys of live markers.
    pub async fn keys(&self) -> Vec<String> {
        self.inner.markers.lock().await.keys().cloned().collect()
    }

    fn check_available(&self) -> Result<(), ExpiryError> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            Err(ExpiryError::Unavailable("in-memory expiry store switched off".to_string()))
        } else {
            Ok(())
        }
    }
}

impl ExpiryStore for InMemoryExpiryStore {
    fn set<'a>(&'a self, key: &'a str, ttl: Duration) -> ExpiryFuture<'a, ()> {
        Box::pin(async move {
            self.check_available()?;
            let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst);
            self.inner.markers.lock().await.insert(
                key.to_string(),
                Marker {
                    deadline: Instant::now().checked_add(ttl),
                    generation,
                },
            );

            let inner = Arc::clone(&self.inner);
            let key = key.to_string();
            tokio::spawn(async move {
                tokio::time::sleep(ttl).await;
                let mut markers = inner.markers.lock().await;
                // A later set or remove supersedes this timer.
                if markers.get(&key).is_some_and(|m| m.generation == generation) {
                    markers.remove(&key);
                    drop(markers);
                    let _ = inner.lapses.send(key);
                }
            });
            Ok(())
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> ExpiryFuture<'a, ()> {
        Box::pin(async move {
            self.check_available()?;
            self.inner.markers.lock().await.remove(key);
            Ok(())
        })
    }

    fn exists<'a>(&'a self, key: &'a str) -> ExpiryFuture<'a, bool> {
        Box::pin(async move {
            self.check_available()?;
            Ok(self.inner.markers.lock().await.contains_key(key))
        })
    }

    fn time_remaining<'a>(&'a self, key: &'a str) -> ExpiryFuture<'a, TimeRemaining> {
        Box::pin(async move {
            self.check_available()?;
            let remaining = match self.inner.markers.lock().await.get(key) {
                None => TimeRemaining::Absent,
                Some(Marker { deadline: None, .. }) => TimeRemaining::NoTtl,
                Some(Marker {
                    deadline: Some(deadline),
                    ..
                }) => TimeRemaining::Remaining(deadline.saturating_duration_since(Instant::now())),
            };
            Ok(remaining)
        })
    }

    fn subscribe(&self) -> ExpiryFuture<'_, LapseStream> {
        Box::pin(async move {
            self.check_available()
                .map_err(|e| ExpiryError::Subscription(e.to_string()))?;
            let mut lapses = self.inner.lapses.subscribe();
            let stream = async_stream::stream! {
                loop {
                    match lapses.recv().await {
                        Ok(key) => yield key,
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            };
            Ok(Box::pin(stream) as LapseStream)
        })
    }

    fn ping(&self) -> ExpiryFuture<'_, ()> {
        Box::pin(async move { self.check_available() })
    }
}
