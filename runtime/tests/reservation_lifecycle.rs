//! End-to-end reservation flows over the in-memory collaborators.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use standbook_core::expiry::TimeRemaining;
use standbook_core::gateway::{GatewayFuture, UnitOfWork};
use standbook_core::{
    BroadcastEnvelope, ConflictKind, EventName, Reservation, ReservationError, ReservationState,
    Space, UserId,
};
use standbook_runtime::{Broadcaster, ConfirmHook, ExpirySource, ReservationService};
use standbook_testing::{InMemoryExpiryStore, InMemoryGateway, ManualClock, fixtures, test_epoch};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::Receiver;

const HOLD: Duration = Duration::from_secs(900);

struct Harness {
    gateway: InMemoryGateway,
    expiry: InMemoryExpiryStore,
    service: ReservationService,
    events: Receiver<Arc<BroadcastEnvelope>>,
    space: Space,
}

async fn harness() -> Harness {
    let gateway = InMemoryGateway::new();
    let expiry = InMemoryExpiryStore::new();
    let broadcaster = Broadcaster::default();
    let events = broadcaster.subscribe();
    let space = fixtures::seed_space(&gateway).await;
    let service = ReservationService::new(
        gateway.as_dyn(),
        expiry.as_dyn(),
        broadcaster,
        Arc::new(ManualClock::new(test_epoch())),
    );
    Harness {
        gateway,
        expiry,
        service,
        events,
        space,
    }
}

fn drain(events: &mut Receiver<Arc<BroadcastEnvelope>>) -> Vec<EventName> {
    let mut names = Vec::new();
    while let Ok(envelope) = events.try_recv() {
        names.push(envelope.event);
    }
    names
}

fn alice() -> UserId {
    UserId::new("alice")
}

#[tokio::test]
async fn test_hold_then_confirm() {
    let mut h = harness().await;
    h.gateway
        .put_profile(fixtures::profile("alice", Some("alice@example.com"), Some("Acme")))
        .await;

    let held = h
        .service
        .create_and_hold(h.space.id, Some(alice()), "Alice", HOLD)
        .await
        .unwrap();
    assert_eq!(held.reservation.state, ReservationState::Pending);
    assert!(held.reservation.expires_at.is_some());
    assert_eq!(held.space_name.as_deref(), Some("A-1"));
    let key = h.service.keys().key(held.reservation.id);
    assert_eq!(h.expiry.keys().await, vec![key]);

    let confirmed = h.service.confirm(held.reservation.id).await.unwrap();

    assert_eq!(confirmed.reservation.reservation.state, ReservationState::Reserved);
    assert_eq!(confirmed.reservation.reservation.expires_at, None);
    assert_eq!(confirmed.updated_space_name, None);
    let contact = confirmed.reservation.client_profile.unwrap();
    assert_eq!(contact.email.as_deref(), Some("alice@example.com"));
    assert!(h.expiry.keys().await.is_empty());
    assert_eq!(
        drain(&mut h.events),
        vec![
            EventName::ReservationCreated,
            EventName::ReservationUpdated,
            EventName::ReservationUpdated,
        ]
    );
}

#[tokio::test]
async fn test_occupied_space_conflicts() {
    let h = harness().await;
    let first = h
        .service
        .create(h.space.id, Some(alice()), "Alice")
        .await
        .unwrap();

    let pending = h
        .service
        .create(h.space.id, Some(UserId::new("bob")), "Bob")
        .await
        .unwrap_err();
    assert_eq!(pending, ReservationError::Conflict(ConflictKind::Pending));

    h.service.confirm(first.reservation.id).await.unwrap();
    let reserved = h
        .service
        .create(h.space.id, Some(UserId::new("bob")), "Bob")
        .await
        .unwrap_err();
    assert_eq!(reserved, ReservationError::Conflict(ConflictKind::Reserved));
    assert_eq!(h.gateway.all_reservations().await.len(), 1);
}

#[tokio::test]
async fn test_cancellation_request_round_trip() {
    let mut h = harness().await;
    let created = h
        .service
        .create(h.space.id, Some(alice()), "Alice")
        .await
        .unwrap();
    let id = created.reservation.id;
    h.service.confirm(id).await.unwrap();
    drain(&mut h.events);

    let requested = h.service.request_cancellation(id, alice()).await.unwrap();
    assert_eq!(requested.reservation.state, ReservationState::CancellationRequested);

    let denied = h.service.deny_cancellation(id).await.unwrap();
    assert_eq!(denied.reservation.state, ReservationState::Reserved);

    h.service.request_cancellation(id, alice()).await.unwrap();
    let approved = h.service.approve_cancellation(id).await.unwrap();
    assert_eq!(approved.reservation.state, ReservationState::Cancelled);

    assert_eq!(
        drain(&mut h.events),
        vec![
            EventName::CancellationRequested,
            EventName::ReservationUpdated,
            EventName::CancellationRequested,
            EventName::ReservationCancelled,
        ]
    );
    // The space is free again.
    h.service
        .create(h.space.id, Some(UserId::new("bob")), "Bob")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_only_the_owner_may_request_cancellation() {
    let h = harness().await;
    let created = h
        .service
        .create(h.space.id, Some(alice()), "Alice")
        .await
        .unwrap();

    let error = h
        .service
        .request_cancellation(created.reservation.id, UserId::new("mallory"))
        .await
        .unwrap_err();

    assert!(matches!(error, ReservationError::Forbidden(_)));
    let stored = h.service.get(created.reservation.id).await.unwrap();
    assert_eq!(stored.reservation.state, ReservationState::Pending);
}

#[tokio::test]
async fn test_owner_cancelling_a_hold_clears_its_marker() {
    let h = harness().await;
    let held = h
        .service
        .create_and_hold(h.space.id, Some(alice()), "Alice", HOLD)
        .await
        .unwrap();

    let cancelled = h
        .service
        .cancel(held.reservation.id, Some(alice()))
        .await
        .unwrap();

    assert_eq!(cancelled.reservation.state, ReservationState::Cancelled);
    assert!(h.expiry.keys().await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_admit_one_winner() {
    let h = harness().await;

    let attempts = (0..16).map(|i| {
        let service = h.service.clone();
        let space_id = h.space.id;
        tokio::spawn(async move {
            service
                .create(space_id, Some(UserId::new(format!("user-{i}"))), "Racer")
                .await
        })
    });
    let results = futures::future::join_all(attempts).await;

    let winners = results
        .iter()
        .filter(|r| r.as_ref().unwrap().is_ok())
        .count();
    assert_eq!(winners, 1);
    for result in results {
        if let Err(error) = result.unwrap() {
            assert_eq!(error, ReservationError::Conflict(ConflictKind::Pending));
        }
    }
    let active = h
        .gateway
        .all_reservations()
        .await
        .into_iter()
        .filter(|r| r.state.is_active())
        .count();
    assert_eq!(active, 1);
}

#[tokio::test]
async fn test_handle_expiry_is_idempotent() {
    let mut h = harness().await;
    let held = h
        .service
        .create_and_hold(h.space.id, Some(alice()), "Alice", HOLD)
        .await
        .unwrap();
    let id = held.reservation.id;
    h.expiry.lose(&h.service.keys().key(id)).await;
    drain(&mut h.events);

    let first = h.service.handle_expiry(id, ExpirySource::Lapse).await.unwrap();
    let second = h.service.handle_expiry(id, ExpirySource::Sweep).await.unwrap();

    assert_eq!(first.unwrap().reservation.state, ReservationState::Expired);
    assert!(second.is_none());
    assert_eq!(drain(&mut h.events), vec![EventName::ReservationExpired]);
}

#[tokio::test]
async fn test_stale_lapse_after_refresh_is_ignored() {
    let mut h = harness().await;
    let held = h
        .service
        .create_and_hold(h.space.id, Some(alice()), "Alice", HOLD)
        .await
        .unwrap();
    let id = held.reservation.id;
    drain(&mut h.events);

    // The marker is live again, so a late lapse must not expire the hold.
    h.service.refresh_hold(id, HOLD).await.unwrap();
    let outcome = h.service.handle_expiry(id, ExpirySource::Lapse).await.unwrap();

    assert!(outcome.is_none());
    let stored = h.service.get(id).await.unwrap();
    assert_eq!(stored.reservation.state, ReservationState::Pending);
    assert_eq!(drain(&mut h.events), vec![EventName::ReservationUpdated]);
}

#[tokio::test]
async fn test_expiry_ignores_confirmed_reservations() {
    let h = harness().await;
    let created = h
        .service
        .create(h.space.id, Some(alice()), "Alice")
        .await
        .unwrap();
    h.service.confirm(created.reservation.id).await.unwrap();

    let outcome = h
        .service
        .handle_expiry(created.reservation.id, ExpirySource::Lapse)
        .await
        .unwrap();

    assert!(outcome.is_none());
}

#[tokio::test]
async fn test_unreachable_expiry_store_rolls_back_the_hold() {
    let mut h = harness().await;
    h.expiry.set_unavailable(true);

    let error = h
        .service
        .create_and_hold(h.space.id, Some(alice()), "Alice", HOLD)
        .await
        .unwrap_err();

    assert!(error.is_retryable());
    assert!(h.gateway.all_reservations().await.is_empty());
    assert!(drain(&mut h.events).is_empty());
}

#[tokio::test]
async fn test_failed_commit_broadcasts_nothing() {
    let mut h = harness().await;
    let created = h
        .service
        .create(h.space.id, Some(alice()), "Alice")
        .await
        .unwrap();
    drain(&mut h.events);
    h.gateway.fail_next_commit();

    let error = h.service.confirm(created.reservation.id).await.unwrap_err();

    assert!(matches!(error, ReservationError::Unavailable(_)));
    assert!(drain(&mut h.events).is_empty());
    let stored = h.service.get(created.reservation.id).await.unwrap();
    assert_eq!(stored.reservation.state, ReservationState::Pending);
}

#[tokio::test]
async fn test_status_reports_marker_and_record() {
    let h = harness().await;
    let held = h
        .service
        .create_and_hold(h.space.id, Some(alice()), "Alice", HOLD)
        .await
        .unwrap();

    let status = h.service.status(held.reservation.id).await.unwrap();
    assert!(status.exists_in_database);
    assert!(status.is_active_in_expiry_store);
    assert!(matches!(status.ttl, TimeRemaining::Remaining(_)));

    let missing = h
        .service
        .status(standbook_core::ReservationId::new())
        .await
        .unwrap();
    assert!(!missing.exists_in_database);
    assert_eq!(missing.ttl, TimeRemaining::Absent);
}

#[tokio::test]
async fn test_listings_filter_by_user_and_state() {
    let h = harness().await;
    let other = fixtures::space(h.space.plan_id);
    h.gateway.put_space(other.clone()).await;

    let mine = h
        .service
        .create(h.space.id, Some(alice()), "Alice")
        .await
        .unwrap();
    h.service
        .create(other.id, Some(UserId::new("bob")), "Bob")
        .await
        .unwrap();
    h.service.confirm(mine.reservation.id).await.unwrap();

    let for_alice = h.service.list_for_user(&alice()).await.unwrap();
    assert_eq!(for_alice.len(), 1);
    assert_eq!(for_alice[0].reservation.id, mine.reservation.id);

    let pending = h.service.list_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].reservation.asignee, "Bob");

    let occupant = h.service.active_for_space(h.space.id).await.unwrap().unwrap();
    assert_eq!(occupant.reservation.state, ReservationState::Reserved);
    assert!(h.service.list_cancellation_requests().await.unwrap().is_empty());
}

/// Renames the space after the holder, as the server's naming hook does.
struct RenameToAsignee;

impl ConfirmHook for RenameToAsignee {
    fn after_confirm<'a>(
        &'a self,
        uow: &'a mut dyn UnitOfWork,
        reservation: &'a Reservation,
    ) -> GatewayFuture<'a, Option<Space>> {
        Box::pin(async move {
            let Some(mut space) = uow.space(reservation.space_id).await? else {
                return Ok(None);
            };
            space.name.clone_from(&reservation.asignee);
            uow.save_space(space.clone()).await?;
            Ok(Some(space))
        })
    }
}

#[tokio::test]
async fn test_confirm_hook_renames_space_inside_the_unit_of_work() {
    let Harness {
        gateway,
        expiry,
        space,
        ..
    } = harness().await;
    let broadcaster = Broadcaster::default();
    let mut events = broadcaster.subscribe();
    let service = ReservationService::new(
        gateway.as_dyn(),
        expiry.as_dyn(),
        broadcaster,
        Arc::new(ManualClock::new(test_epoch())),
    )
    .with_confirm_hook(Arc::new(RenameToAsignee));

    let created = service.create(space.id, None, "Globex").await.unwrap();
    drain(&mut events);
    let confirmed = service.confirm(created.reservation.id).await.unwrap();

    assert_eq!(confirmed.updated_space_name.as_deref(), Some("Globex"));
    assert_eq!(confirmed.reservation.space_name.as_deref(), Some("Globex"));
    assert_eq!(
        drain(&mut events),
        vec![EventName::ReservationUpdated, EventName::SpaceUpdated]
    );
}
