//! Redis-backed [`ExpiryStore`].

use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use standbook_core::expiry::{ExpiryError, ExpiryFuture, ExpiryStore, LapseStream, TimeRemaining};
use std::time::Duration;

fn unavailable(context: &str, error: &RedisError) -> ExpiryError {
    tracing::warn!(error = %error, "{context}");
    ExpiryError::Unavailable(format!("{context}: {error}"))
}

/// Hold markers stored as Redis keys with a TTL.
///
/// A marker is `SET key 1 PX ttl`; its lapse is the `expired` keyevent Redis
/// publishes when the key is evicted. Redis only publishes those events when
/// `notify-keyspace-events` includes `Ex`, see
/// [`RedisExpiryStore::configure_notifications`].
#[derive(Clone)]
pub struct RedisExpiryStore {
    client: Client,
    conn_manager: ConnectionManager,
    database: i64,
}

impl RedisExpiryStore {
    /// Connect to `redis_url`. The database index is taken from the URL path.
    ///
    /// # Errors
    ///
    /// Returns [`ExpiryError::Unavailable`] if the URL is invalid or the server
    /// cannot be reached.
    pub async fn connect(redis_url: &str) -> Result<Self, ExpiryError> {
        let client = Client::open(redis_url)
            .map_err(|e| unavailable("Failed to create Redis client", &e))?;
        let database = client.get_connection_info().redis.db;

        let conn_manager = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| unavailable("Failed to create Redis connection manager", &e))?;

        tracing::info!(database, "Connected to Redis expiry store");
        Ok(Self {
            client,
            conn_manager,
            database,
        })
    }

    /// Connection shared with other Redis adapters.
    #[must_use]
    pub fn connection(&self) -> ConnectionManager {
        self.conn_manager.clone()
    }

    /// Channel carrying the names of expired keys.
    #[must_use]
    pub fn lapse_channel(&self) -> String {
        format!("__keyevent@{}__:expired", self.database)
    }

    /// Turn on expired-key notifications (`CONFIG SET notify-keyspace-events Ex`).
    ///
    /// Managed Redis offerings often refuse `CONFIG`; there the setting must be
    /// made out of band.
    ///
    /// # Errors
    ///
    /// Returns [`ExpiryError::Subscription`] if the server refuses the command.
    pub async fn configure_notifications(&self) -> Result<(), ExpiryError> {
        let mut conn = self.conn_manager.clone();
        let _: () = redis::cmd("CONFIG")
            .arg("SET")
            .arg("notify-keyspace-events")
            .arg("Ex")
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                ExpiryError::Subscription(format!("Failed to enable keyspace notifications: {e}"))
            })?;
        tracing::info!("Enabled expired-key notifications");
        Ok(())
    }
}

impl ExpiryStore for RedisExpiryStore {
    fn set<'a>(&'a self, key: &'a str, ttl: Duration) -> ExpiryFuture<'a, ()> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
            let _: () = conn
                .pset_ex(key, 1, millis)
                .await
                .map_err(|e| unavailable("Failed to set hold marker", &e))?;
            tracing::debug!(key, ttl_ms = millis, "Set hold marker");
            Ok(())
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> ExpiryFuture<'a, ()> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let removed: i64 = conn
                .del(key)
                .await
                .map_err(|e| unavailable("Failed to remove hold marker", &e))?;
            tracing::debug!(key, removed, "Removed hold marker");
            Ok(())
        })
    }

    fn exists<'a>(&'a self, key: &'a str) -> ExpiryFuture<'a, bool> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            conn.exists(key)
                .await
                .map_err(|e| unavailable("Failed to check hold marker", &e))
        })
    }

    fn time_remaining<'a>(&'a self, key: &'a str) -> ExpiryFuture<'a, TimeRemaining> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let millis: i64 = conn
                .pttl(key)
                .await
                .map_err(|e| unavailable("Failed to read hold marker ttl", &e))?;
            Ok(match millis {
                -2 => TimeRemaining::Absent,
                ms if ms < 0 => TimeRemaining::NoTtl,
                ms => TimeRemaining::Remaining(Duration::from_millis(ms.unsigned_abs())),
            })
        })
    }

    fn subscribe(&self) -> ExpiryFuture<'_, LapseStream> {
        Box::pin(async move {
            let channel = self.lapse_channel();
            let mut pubsub = self.client.get_async_pubsub().await.map_err(|e| {
                ExpiryError::Subscription(format!("Failed to open pub/sub connection: {e}"))
            })?;
            pubsub.subscribe(channel.as_str()).await.map_err(|e| {
                ExpiryError::Subscription(format!("Failed to subscribe to {channel}: {e}"))
            })?;
            tracing::info!(%channel, "Subscribed to lapse notifications");

            let keys = pubsub.into_on_message().filter_map(|msg| async move {
                match msg.get_payload::<String>() {
                    Ok(key) => Some(key),
                    Err(e) => {
                        tracing::warn!(error = %e, "Dropping undecodable lapse notification");
                        None
                    }
                }
            });
            Ok(Box::pin(keys) as LapseStream)
        })
    }

    fn ping(&self) -> ExpiryFuture<'_, ()> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let _: String = redis::cmd("PING")
                .query_async(&mut conn)
                .await
                .map_err(|e| unavailable("Redis ping failed", &e))?;
            Ok(())
        })
    }
}
