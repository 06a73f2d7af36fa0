//! Record builders with deterministic timestamps.

use crate::mocks::InMemoryGateway;
use crate::test_epoch;
use standbook_core::{
    Event, EventId, Geometry, Plan, PlanId, Reservation, ReservationId, ReservationState,
    ShapeKind, Space, SpaceId, UserId, UserProfile, Zone, ZoneId,
};

/// Visible event without a reservation window.
#[must_use]
pub fn event() -> Event {
    Event {
        id: EventId::new(),
        name: "Expo 2025".to_string(),
        reservable_from: None,
        reservable_until: None,
        visible: true,
        created_at: test_epoch(),
        updated_at: test_epoch(),
    }
}

/// 1000×800 plan.
#[must_use]
pub fn plan(event_id: Option<EventId>) -> Plan {
    Plan {
        id: PlanId::new(),
        event_id,
        name: "Hall 1".to_string(),
        url: "https://cdn.example.com/plans/hall-1.png".to_string(),
        width: 1000,
        height: 800,
        pixels_per_meter: Some(20.0),
        created_at: test_epoch(),
        updated_at: test_epoch(),
    }
}

/// 40×30 rectangle at (10, 20).
#[must_use]
pub fn geometry() -> Geometry {
    Geometry {
        kind: ShapeKind::Rect,
        x: 10.0,
        y: 20.0,
        width: 40.0,
        height: 30.0,
        rotation: 0.0,
        color: "#22AA55".to_string(),
    }
}

/// Active space named `A-1`.
#[must_use]
pub fn space(plan_id: PlanId) -> Space {
    Space {
        id: SpaceId::new(),
        plan_id,
        zone_id: None,
        name: "A-1".to_string(),
        geometry: geometry(),
        price: Some(1500.0),
        active: true,
        created_at: test_epoch(),
        updated_at: test_epoch(),
    }
}

/// Zone named `North`.
#[must_use]
pub fn zone(plan_id: PlanId) -> Zone {
    Zone {
        id: ZoneId::new(),
        plan_id,
        name: "North".to_string(),
        description: Some("Food court side".to_string()),
        geometry: geometry(),
        price: None,
        active: true,
        created_at: test_epoch(),
        updated_at: test_epoch(),
    }
}

/// Profile with the given contact fields.
#[must_use]
pub fn profile(user_id: &str, email: Option<&str>, company: Option<&str>) -> UserProfile {
    UserProfile {
        user_id: UserId::new(user_id),
        email: email.map(str::to_string),
        phone: None,
        linkedin: Some(format!("https://linkedin.com/in/{user_id}")),
        company: company.map(str::to_string),
        position: None,
        notes: None,
        created_at: test_epoch(),
        updated_at: test_epoch(),
    }
}

/// Reservation of `space_id` in `state`.
#[must_use]
pub fn reservation(space_id: SpaceId, user_id: Option<&str>, state: ReservationState) -> Reservation {
    Reservation {
        id: ReservationId::new(),
        space_id,
        user_id: user_id.map(UserId::new),
        asignee: "Alice".to_string(),
        state,
        expires_at: None,
        created_at: test_epoch(),
        updated_at: test_epoch(),
    }
}

/// Seed a plan with one active space and return the space.
pub async fn seed_space(gateway: &InMemoryGateway) -> Space {
    let plan = plan(None);
    let space = space(plan.id);
    gateway.put_plan(plan).await;
    gateway.put_space(space.clone()).await;
    space
}
