//! Lapse listener and reconciliation sweep.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use standbook_core::{EventName, ReservationId, ReservationState, UserId};
use standbook_runtime::{
    Broadcaster, ExpiryListener, ReconciliationSweep, ReservationService, RetryPolicy,
};
use standbook_testing::{InMemoryExpiryStore, InMemoryGateway, ManualClock, fixtures, test_epoch};
use std::sync::Arc;
use std::time::Duration;

const HOLD: Duration = Duration::from_secs(60);

fn service(
    gateway: &InMemoryGateway,
    expiry: &InMemoryExpiryStore,
    clock: &ManualClock,
    broadcaster: Broadcaster,
) -> ReservationService {
    ReservationService::new(
        gateway.as_dyn(),
        expiry.as_dyn(),
        broadcaster,
        Arc::new(clock.clone()),
    )
}

async fn wait_for_state(
    service: &ReservationService,
    id: ReservationId,
    expected: ReservationState,
) -> ReservationState {
    let mut state = service.get(id).await.unwrap().reservation.state;
    for _ in 0..100 {
        if state == expected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        state = service.get(id).await.unwrap().reservation.state;
    }
    state
}

#[tokio::test(start_paused = true)]
async fn test_listener_expires_lapsed_hold() {
    let gateway = InMemoryGateway::new();
    let expiry = InMemoryExpiryStore::new();
    let clock = ManualClock::new(test_epoch());
    let broadcaster = Broadcaster::default();
    let mut events = broadcaster.subscribe();
    let service = service(&gateway, &expiry, &clock, broadcaster);
    let space = fixtures::seed_space(&gateway).await;

    let listener = ExpiryListener::new(service.clone()).start();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let held = service
        .create_and_hold(space.id, Some(UserId::new("alice")), "Alice", HOLD)
        .await
        .unwrap();
    tokio::time::sleep(HOLD + Duration::from_secs(1)).await;

    let state = wait_for_state(&service, held.reservation.id, ReservationState::Expired).await;
    assert_eq!(state, ReservationState::Expired);

    let mut names = Vec::new();
    while let Ok(envelope) = events.try_recv() {
        names.push(envelope.event);
    }
    assert_eq!(names.last(), Some(&EventName::ReservationExpired));

    // The space can be held again.
    service
        .create(space.id, Some(UserId::new("bob")), "Bob")
        .await
        .unwrap();
    listener.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_listener_survives_refresh_before_deadline() {
    let gateway = InMemoryGateway::new();
    let expiry = InMemoryExpiryStore::new();
    let clock = ManualClock::new(test_epoch());
    let service = service(&gateway, &expiry, &clock, Broadcaster::default());
    let space = fixtures::seed_space(&gateway).await;

    let listener = ExpiryListener::new(service.clone()).start();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let held = service
        .create_and_hold(space.id, None, "Admin hold", HOLD)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(50)).await;
    service.refresh_hold(held.reservation.id, HOLD).await.unwrap();
    // Past the first deadline, before the refreshed one.
    tokio::time::sleep(Duration::from_secs(30)).await;

    let stored = service.get(held.reservation.id).await.unwrap();
    assert_eq!(stored.reservation.state, ReservationState::Pending);
    listener.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_listener_resubscribes_after_store_outage() {
    let gateway = InMemoryGateway::new();
    let expiry = InMemoryExpiryStore::new();
    let clock = ManualClock::new(test_epoch());
    let service = service(&gateway, &expiry, &clock, Broadcaster::default());
    let space = fixtures::seed_space(&gateway).await;

    expiry.set_unavailable(true);
    let listener = ExpiryListener::new(service.clone())
        .with_retry_policy(
            RetryPolicy::builder()
                .initial_delay(Duration::from_millis(100))
                .max_delay(Duration::from_secs(1))
                .build(),
        )
        .start();
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert!(!listener.is_finished());

    expiry.set_unavailable(false);
    tokio::time::sleep(Duration::from_secs(2)).await;

    let held = service
        .create_and_hold(space.id, Some(UserId::new("alice")), "Alice", HOLD)
        .await
        .unwrap();
    assert!(expiry.lapse_now(&service.keys().key(held.reservation.id)).await);

    let state = wait_for_state(&service, held.reservation.id, ReservationState::Expired).await;
    assert_eq!(state, ReservationState::Expired);
    listener.stop().await;
}

#[tokio::test]
async fn test_sweep_expires_holds_whose_lapse_was_lost() {
    let gateway = InMemoryGateway::new();
    let expiry = InMemoryExpiryStore::new();
    let clock = ManualClock::new(test_epoch());
    let service = service(&gateway, &expiry, &clock, Broadcaster::default());
    let lost_space = fixtures::seed_space(&gateway).await;
    let live_space = fixtures::space(lost_space.plan_id);
    gateway.put_space(live_space.clone()).await;

    let lost = service
        .create_and_hold(lost_space.id, Some(UserId::new("alice")), "Alice", HOLD)
        .await
        .unwrap();
    let live = service
        .create_and_hold(live_space.id, Some(UserId::new("bob")), "Bob", HOLD)
        .await
        .unwrap();
    expiry.lose(&service.keys().key(lost.reservation.id)).await;
    clock.advance(HOLD + Duration::from_secs(1));

    let sweep = ReconciliationSweep::new(service.clone(), Duration::from_secs(30));
    let expired = sweep.run_once().await.unwrap();

    assert_eq!(expired, 1);
    let lost = service.get(lost.reservation.id).await.unwrap();
    assert_eq!(lost.reservation.state, ReservationState::Expired);
    // A live marker wins over a passed deadline.
    let live = service.get(live.reservation.id).await.unwrap();
    assert_eq!(live.reservation.state, ReservationState::Pending);

    assert_eq!(sweep.run_once().await.unwrap(), 0);
}

#[tokio::test]
async fn test_sweep_ignores_holds_without_deadline() {
    let gateway = InMemoryGateway::new();
    let expiry = InMemoryExpiryStore::new();
    let clock = ManualClock::new(test_epoch());
    let service = service(&gateway, &expiry, &clock, Broadcaster::default());
    let space = fixtures::seed_space(&gateway).await;

    let created = service.create(space.id, None, "Walk-in").await.unwrap();
    clock.advance(Duration::from_secs(86_400));

    let sweep = ReconciliationSweep::new(service.clone(), Duration::from_secs(30));

    assert_eq!(sweep.run_once().await.unwrap(), 0);
    let stored = service.get(created.reservation.id).await.unwrap();
    assert_eq!(stored.reservation.state, ReservationState::Pending);
}

#[tokio::test(start_paused = true)]
async fn test_started_sweep_runs_immediately() {
    let gateway = InMemoryGateway::new();
    let expiry = InMemoryExpiryStore::new();
    let clock = ManualClock::new(test_epoch());
    let service = service(&gateway, &expiry, &clock, Broadcaster::default());
    let space = fixtures::seed_space(&gateway).await;

    let held = service
        .create_and_hold(space.id, Some(UserId::new("alice")), "Alice", Duration::from_secs(600))
        .await
        .unwrap();
    expiry.lose(&service.keys().key(held.reservation.id)).await;
    clock.advance(Duration::from_secs(601));

    let sweep = ReconciliationSweep::new(service.clone(), Duration::from_secs(300)).start();

    let state = wait_for_state(&service, held.reservation.id, ReservationState::Expired).await;
    assert_eq!(state, ReservationState::Expired);
    sweep.stop().await;
}

#[tokio::test]
async fn test_sweep_reports_unavailable_storage() {
    let gateway = InMemoryGateway::new();
    let expiry = InMemoryExpiryStore::new();
    let clock = ManualClock::new(test_epoch());
    let service = service(&gateway, &expiry, &clock, Broadcaster::default());
    gateway.set_unavailable(true);

    let sweep = ReconciliationSweep::new(service, Duration::from_secs(30));

    assert!(sweep.run_once().await.unwrap_err().is_retryable());
}
