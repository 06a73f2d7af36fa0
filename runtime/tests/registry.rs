//! Registry CRUD and forced space status changes.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use standbook_core::{
    BroadcastEnvelope, ConflictKind, EventName, Payload, ReservationError, ReservationState,
    Space, SpaceStatus, UserId,
};
use standbook_runtime::registry::{
    GeometryPatch, NewEvent, NewPlan, NewSpace, NewZone, ProfileFields, SpacePatch,
};
use standbook_runtime::{Broadcaster, Registry, ReservationService};
use standbook_testing::{InMemoryExpiryStore, InMemoryGateway, fixtures, test_clock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::Receiver;

struct Harness {
    gateway: InMemoryGateway,
    expiry: InMemoryExpiryStore,
    service: ReservationService,
    registry: Registry,
    events: Receiver<Arc<BroadcastEnvelope>>,
}

fn harness() -> Harness {
    let gateway = InMemoryGateway::new();
    let expiry = InMemoryExpiryStore::new();
    let broadcaster = Broadcaster::default();
    let events = broadcaster.subscribe();
    let service = ReservationService::new(
        gateway.as_dyn(),
        expiry.as_dyn(),
        broadcaster,
        Arc::new(test_clock()),
    );
    Harness {
        gateway,
        expiry,
        registry: Registry::new(service.clone()),
        service,
        events,
    }
}

fn drain(events: &mut Receiver<Arc<BroadcastEnvelope>>) -> Vec<EventName> {
    let mut names = Vec::new();
    while let Ok(envelope) = events.try_recv() {
        names.push(envelope.event);
    }
    names
}

fn admin() -> Option<UserId> {
    Some(UserId::new("admin"))
}

#[tokio::test]
async fn test_reserving_a_free_space_creates_and_confirms() {
    let mut h = harness();
    let space = fixtures::seed_space(&h.gateway).await;

    let state = h
        .registry
        .set_space_status(space.id, SpaceStatus::Reserved, admin(), "Acme")
        .await
        .unwrap();

    let reservation = state.reservation.unwrap();
    assert_eq!(reservation.reservation.state, ReservationState::Reserved);
    assert_eq!(reservation.reservation.asignee, "Acme");
    assert_eq!(
        drain(&mut h.events),
        vec![
            EventName::ReservationCreated,
            EventName::ReservationUpdated,
            EventName::SpaceUpdated,
        ]
    );
}

#[tokio::test]
async fn test_pending_on_a_free_space_holds_without_marker() {
    let h = harness();
    let space = fixtures::seed_space(&h.gateway).await;

    let state = h
        .registry
        .set_space_status(space.id, SpaceStatus::Pending, admin(), "Walk-in")
        .await
        .unwrap();

    let reservation = state.reservation.unwrap().reservation;
    assert_eq!(reservation.state, ReservationState::Pending);
    assert_eq!(reservation.expires_at, None);
    assert!(h.expiry.keys().await.is_empty());

    // Asking again is a no-op.
    let again = h
        .registry
        .set_space_status(space.id, SpaceStatus::Pending, admin(), "Walk-in")
        .await
        .unwrap();
    assert_eq!(again.reservation.unwrap().reservation.id, reservation.id);
    assert_eq!(h.gateway.all_reservations().await.len(), 1);
}

#[tokio::test]
async fn test_pending_on_a_reserved_space_conflicts() {
    let h = harness();
    let space = fixtures::seed_space(&h.gateway).await;
    h.registry
        .set_space_status(space.id, SpaceStatus::Reserved, admin(), "Acme")
        .await
        .unwrap();

    let error = h
        .registry
        .set_space_status(space.id, SpaceStatus::Pending, admin(), "Other")
        .await
        .unwrap_err();

    assert_eq!(error, ReservationError::Conflict(ConflictKind::Reserved));
}

#[tokio::test]
async fn test_blocking_cancels_the_occupant_and_clears_its_hold() {
    let mut h = harness();
    let space = fixtures::seed_space(&h.gateway).await;
    let held = h
        .service
        .create_and_hold(space.id, Some(UserId::new("alice")), "Alice", Duration::from_secs(900))
        .await
        .unwrap();
    drain(&mut h.events);

    let state = h
        .registry
        .set_space_status(space.id, SpaceStatus::Blocked, admin(), "")
        .await
        .unwrap();

    assert!(!state.space.active);
    assert!(state.reservation.is_none());
    let cancelled = h.service.get(held.reservation.id).await.unwrap();
    assert_eq!(cancelled.reservation.state, ReservationState::Cancelled);
    assert!(h.expiry.keys().await.is_empty());
    assert_eq!(
        drain(&mut h.events),
        vec![EventName::ReservationCancelled, EventName::SpaceUpdated]
    );

    // Blocked spaces refuse new holds until reopened.
    let refused = h
        .service
        .create(space.id, Some(UserId::new("bob")), "Bob")
        .await
        .unwrap_err();
    assert!(matches!(refused, ReservationError::Validation(_)));

    let reopened = h
        .registry
        .set_space_status(space.id, SpaceStatus::Available, admin(), "")
        .await
        .unwrap();
    assert!(reopened.space.active);
    h.service
        .create(space.id, Some(UserId::new("bob")), "Bob")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_reserved_denies_a_pending_cancellation_request() {
    let h = harness();
    let space = fixtures::seed_space(&h.gateway).await;
    let created = h
        .service
        .create(space.id, Some(UserId::new("alice")), "Alice")
        .await
        .unwrap();
    h.service.confirm(created.reservation.id).await.unwrap();
    h.service
        .request_cancellation(created.reservation.id, UserId::new("alice"))
        .await
        .unwrap();

    let state = h
        .registry
        .set_space_status(space.id, SpaceStatus::Reserved, admin(), "ignored")
        .await
        .unwrap();

    let reservation = state.reservation.unwrap().reservation;
    assert_eq!(reservation.id, created.reservation.id);
    assert_eq!(reservation.state, ReservationState::Reserved);
    assert_eq!(reservation.asignee, "Alice");
}

#[tokio::test]
async fn test_available_approves_a_pending_cancellation_request() {
    let h = harness();
    let space = fixtures::seed_space(&h.gateway).await;
    let created = h
        .service
        .create(space.id, Some(UserId::new("alice")), "Alice")
        .await
        .unwrap();
    h.service.confirm(created.reservation.id).await.unwrap();
    h.service
        .request_cancellation(created.reservation.id, UserId::new("alice"))
        .await
        .unwrap();

    h.registry
        .set_space_status(space.id, SpaceStatus::Available, admin(), "")
        .await
        .unwrap();

    let stored = h.service.get(created.reservation.id).await.unwrap();
    assert_eq!(stored.reservation.state, ReservationState::Cancelled);
}

#[tokio::test]
async fn test_status_change_on_unknown_space_is_not_found() {
    let h = harness();

    let error = h
        .registry
        .set_space_status(standbook_core::SpaceId::new(), SpaceStatus::Reserved, admin(), "Acme")
        .await
        .unwrap_err();

    assert!(matches!(error, ReservationError::NotFound { resource: "Space", .. }));
}

#[tokio::test]
async fn test_catalogue_crud() {
    let mut h = harness();

    let event = h
        .registry
        .create_event(NewEvent {
            name: "  Expo  ".to_string(),
            reservable_from: None,
            reservable_until: None,
            visible: true,
        })
        .await
        .unwrap();
    assert_eq!(event.name, "Expo");

    let plan = h
        .registry
        .create_plan(NewPlan {
            event_id: Some(event.id),
            name: "Hall 1".to_string(),
            url: "https://cdn.example.com/hall-1.png".to_string(),
            width: 1000,
            height: 800,
            pixels_per_meter: None,
        })
        .await
        .unwrap();

    let zone = h
        .registry
        .create_zone(NewZone {
            plan_id: plan.id,
            name: "North".to_string(),
            description: None,
            geometry: fixtures::geometry(),
            price: None,
            active: true,
        })
        .await
        .unwrap();

    let space = h
        .registry
        .create_space(NewSpace {
            plan_id: plan.id,
            zone_id: Some(zone.id),
            name: "B-7".to_string(),
            geometry: fixtures::geometry(),
            price: Some(900.0),
            active: true,
        })
        .await
        .unwrap();
    assert_eq!(drain(&mut h.events), vec![EventName::SpaceUpdated]);

    let moved = h
        .registry
        .update_space(
            space.id,
            SpacePatch {
                geometry: GeometryPatch {
                    x: Some(250.0),
                    ..GeometryPatch::default()
                },
                ..SpacePatch::default()
            },
        )
        .await
        .unwrap();
    assert!((moved.geometry.x - 250.0).abs() < f64::EPSILON);
    assert_eq!(moved.name, "B-7");

    let detail = h.registry.get_plan(plan.id).await.unwrap();
    assert_eq!(detail.spaces.len(), 1);
    assert_eq!(detail.zones.len(), 1);

    drain(&mut h.events);
    h.registry.delete_zone(zone.id).await.unwrap();
    let detached = h.registry.get_space(space.id).await.unwrap();
    assert_eq!(detached.zone_id, None);
    let envelope = h.events.try_recv().unwrap();
    assert!(matches!(&envelope.payload, Payload::Space(s) if s.zone_id.is_none()));

    h.registry.delete_event(event.id).await.unwrap();
    assert!(matches!(
        h.registry.get_plan(plan.id).await.unwrap_err(),
        ReservationError::NotFound { .. }
    ));
}

#[tokio::test]
async fn test_invalid_records_are_rejected() {
    let h = harness();
    let space = fixtures::seed_space(&h.gateway).await;

    let blank = h
        .registry
        .update_space(
            space.id,
            SpacePatch {
                name: Some("   ".to_string()),
                ..SpacePatch::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(blank, ReservationError::Validation(_)));

    let orphan = h
        .registry
        .create_plan(NewPlan {
            event_id: Some(standbook_core::EventId::new()),
            name: "Hall 2".to_string(),
            url: "https://cdn.example.com/hall-2.png".to_string(),
            width: 10,
            height: 10,
            pixels_per_meter: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(orphan, ReservationError::Validation(_)));

    let flat = h
        .registry
        .create_plan(NewPlan {
            event_id: None,
            name: "Hall 3".to_string(),
            url: "https://cdn.example.com/hall-3.png".to_string(),
            width: 0,
            height: 10,
            pixels_per_meter: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(flat, ReservationError::Validation(_)));
}

#[tokio::test]
async fn test_occupied_space_cannot_be_deleted() {
    let h = harness();
    let space: Space = fixtures::seed_space(&h.gateway).await;
    h.service
        .create(space.id, Some(UserId::new("alice")), "Alice")
        .await
        .unwrap();

    let error = h.registry.delete_space(space.id).await.unwrap_err();

    assert_eq!(error, ReservationError::Conflict(ConflictKind::Active));
    assert!(h.registry.get_space(space.id).await.is_ok());
}

#[tokio::test]
async fn test_profile_merge_and_completeness() {
    let h = harness();
    let user = UserId::new("alice");

    assert!(!h.registry.profile_complete(&user).await.unwrap());
    assert!(matches!(
        h.registry.profile(&user).await.unwrap_err(),
        ReservationError::NotFound { resource: "Profile", .. }
    ));

    h.registry
        .upsert_profile(
            user.clone(),
            ProfileFields {
                email: Some("alice@example.com".to_string()),
                company: Some("Acme".to_string()),
                ..ProfileFields::default()
            },
        )
        .await
        .unwrap();
    assert!(h.registry.profile_complete(&user).await.unwrap());

    let cleared = h
        .registry
        .upsert_profile(
            user.clone(),
            ProfileFields {
                email: Some(String::new()),
                ..ProfileFields::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.email, None);
    assert_eq!(cleared.company.as_deref(), Some("Acme"));
    assert!(!h.registry.profile_complete(&user).await.unwrap());
}
