//! Integration tests for the Redis adapters using testcontainers.
//!
//! Docker must be running. The tests are ignored by default; run them with
//! `cargo test -p standbook-redis -- --ignored`.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use futures::StreamExt;
use redis::AsyncCommands;
use standbook_core::auth::{AuthError, Authenticator};
use standbook_core::expiry::{ExpiryStore, TimeRemaining};
use standbook_redis::{DEFAULT_SESSION_PREFIX, RedisExpiryStore, RedisSessionAuthenticator};
use std::time::Duration;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;

/// Start a Redis container and return a connected store with lapse
/// notifications enabled.
async fn setup_store() -> (ContainerAsync<Redis>, RedisExpiryStore) {
    let container = Redis::default()
        .start()
        .await
        .expect("Failed to start redis container");
    let port = container
        .get_host_port_ipv4(6379)
        .await
        .expect("Failed to get redis port");
    let redis_url = format!("redis://127.0.0.1:{port}/0");

    let mut retries = 0;
    loop {
        if let Ok(store) = RedisExpiryStore::connect(&redis_url).await {
            if store.ping().await.is_ok() {
                store
                    .configure_notifications()
                    .await
                    .expect("Failed to enable notifications");
                return (container, store);
            }
        }
        assert!(retries < 30, "Failed to connect after {retries} retries");
        retries += 1;
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_marker_lifecycle() {
    let (_container, store) = setup_store().await;
    let key = "reservation:lifecycle";

    assert!(!store.exists(key).await.unwrap());
    assert_eq!(store.time_remaining(key).await.unwrap(), TimeRemaining::Absent);

    store.set(key, Duration::from_secs(30)).await.unwrap();
    assert!(store.exists(key).await.unwrap());
    match store.time_remaining(key).await.unwrap() {
        TimeRemaining::Remaining(left) => assert!(left <= Duration::from_secs(30)),
        other => panic!("Expected a remaining ttl, got {other:?}"),
    }

    store.remove(key).await.unwrap();
    assert!(!store.exists(key).await.unwrap());
    // Removing twice is fine.
    store.remove(key).await.unwrap();
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_marker_without_ttl_is_reported() {
    let (_container, store) = setup_store().await;
    let mut conn = store.connection();
    let _: () = conn.set("reservation:forever", 1).await.unwrap();

    assert_eq!(
        store.time_remaining("reservation:forever").await.unwrap(),
        TimeRemaining::NoTtl
    );
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_lapse_is_published() {
    let (_container, store) = setup_store().await;
    let mut lapses = store.subscribe().await.unwrap();

    store
        .set("reservation:short", Duration::from_millis(200))
        .await
        .unwrap();
    // Redis evicts lazily or on its active expiry cycle; allow a few seconds.
    let key = tokio::time::timeout(Duration::from_secs(5), lapses.next())
        .await
        .expect("No lapse within timeout")
        .expect("Lapse stream ended");

    assert_eq!(key, "reservation:short");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_removed_marker_does_not_lapse() {
    let (_container, store) = setup_store().await;
    let mut lapses = store.subscribe().await.unwrap();

    store
        .set("reservation:removed", Duration::from_millis(300))
        .await
        .unwrap();
    store.remove("reservation:removed").await.unwrap();

    let next = tokio::time::timeout(Duration::from_secs(2), lapses.next()).await;
    assert!(next.is_err(), "Removed marker must not lapse");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_session_lookup() {
    let (_container, store) = setup_store().await;
    let mut conn = store.connection();
    let _: () = conn
        .set(
            format!("{DEFAULT_SESSION_PREFIX}good-token"),
            r#"{"user_id":"alice","email":"alice@example.com","roles":["Admin"]}"#,
        )
        .await
        .unwrap();
    let _: () = conn
        .set(format!("{DEFAULT_SESSION_PREFIX}bad-token"), "not json")
        .await
        .unwrap();

    let auth = RedisSessionAuthenticator::new(store.connection(), DEFAULT_SESSION_PREFIX);

    let identity = auth.authenticate("good-token").await.unwrap();
    assert_eq!(identity.user_id.as_str(), "alice");
    assert!(identity.is_admin());

    assert_eq!(
        auth.authenticate("missing").await.unwrap_err(),
        AuthError::InvalidCredential
    );
    assert_eq!(
        auth.authenticate("bad-token").await.unwrap_err(),
        AuthError::InvalidCredential
    );
    assert_eq!(auth.authenticate("").await.unwrap_err(), AuthError::InvalidCredential);
}
