//! Column lists and row decoders.

use crate::error::{corrupt, store_error};
use sqlx::Row;
use sqlx::postgres::PgRow;
use standbook_core::gateway::StoreError;
use standbook_core::{
    Event, EventId, Geometry, Plan, PlanId, Reservation, ReservationId, ReservationState,
    ShapeKind, Space, SpaceId, UserId, UserProfile, Zone, ZoneId,
};
use uuid::Uuid;

pub(crate) const RESERVATION_COLUMNS: &str =
    "id, space_id, user_id, asignee, state, expires_at, created_at, updated_at";

pub(crate) const SPACE_COLUMNS: &str = "id, plan_id, zone_id, name, kind, x, y, width, height, \
     rotation, color, price, active, created_at, updated_at";

pub(crate) const ZONE_COLUMNS: &str = "id, plan_id, name, description, kind, x, y, width, \
     height, rotation, color, price, active, created_at, updated_at";

pub(crate) const PLAN_COLUMNS: &str =
    "id, event_id, name, url, width, height, pixels_per_meter, created_at, updated_at";

pub(crate) const EVENT_COLUMNS: &str =
    "id, name, reservable_from, reservable_until, visible, created_at, updated_at";

pub(crate) const PROFILE_COLUMNS: &str =
    "user_id, email, phone, linkedin, company, position, notes, created_at, updated_at";

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column).map_err(store_error)
}

fn geometry(row: &PgRow) -> Result<Geometry, StoreError> {
    let kind: String = get(row, "kind")?;
    Ok(Geometry {
        kind: ShapeKind::parse(&kind).ok_or_else(|| corrupt("kind", &kind))?,
        x: get(row, "x")?,
        y: get(row, "y")?,
        width: get(row, "width")?,
        height: get(row, "height")?,
        rotation: get(row, "rotation")?,
        color: get(row, "color")?,
    })
}

pub(crate) fn reservation(row: &PgRow) -> Result<Reservation, StoreError> {
    let state: String = get(row, "state")?;
    Ok(Reservation {
        id: ReservationId::from_uuid(get(row, "id")?),
        space_id: SpaceId::from_uuid(get(row, "space_id")?),
        user_id: get::<Option<String>>(row, "user_id")?.map(UserId::new),
        asignee: get(row, "asignee")?,
        state: ReservationState::parse(&state).ok_or_else(|| corrupt("state", &state))?,
        expires_at: get(row, "expires_at")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

pub(crate) fn space(row: &PgRow) -> Result<Space, StoreError> {
    Ok(Space {
        id: SpaceId::from_uuid(get(row, "id")?),
        plan_id: PlanId::from_uuid(get(row, "plan_id")?),
        zone_id: get::<Option<Uuid>>(row, "zone_id")?.map(ZoneId::from_uuid),
        name: get(row, "name")?,
        geometry: geometry(row)?,
        price: get(row, "price")?,
        active: get(row, "active")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

pub(crate) fn zone(row: &PgRow) -> Result<Zone, StoreError> {
    Ok(Zone {
        id: ZoneId::from_uuid(get(row, "id")?),
        plan_id: PlanId::from_uuid(get(row, "plan_id")?),
        name: get(row, "name")?,
        description: get(row, "description")?,
        geometry: geometry(row)?,
        price: get(row, "price")?,
        active: get(row, "active")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

pub(crate) fn plan(row: &PgRow) -> Result<Plan, StoreError> {
    Ok(Plan {
        id: PlanId::from_uuid(get(row, "id")?),
        event_id: get::<Option<Uuid>>(row, "event_id")?.map(EventId::from_uuid),
        name: get(row, "name")?,
        url: get(row, "url")?,
        width: get(row, "width")?,
        height: get(row, "height")?,
        pixels_per_meter: get(row, "pixels_per_meter")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

pub(crate) fn event(row: &PgRow) -> Result<Event, StoreError> {
    Ok(Event {
        id: EventId::from_uuid(get(row, "id")?),
        name: get(row, "name")?,
        reservable_from: get(row, "reservable_from")?,
        reservable_until: get(row, "reservable_until")?,
        visible: get(row, "visible")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

pub(crate) fn profile(row: &PgRow) -> Result<UserProfile, StoreError> {
    Ok(UserProfile {
        user_id: UserId::new(get::<String>(row, "user_id")?),
        email: get(row, "email")?,
        phone: get(row, "phone")?,
        linkedin: get(row, "linkedin")?,
        company: get(row, "company")?,
        position: get(row, "position")?,
        notes: get(row, "notes")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

/// Decode every row, failing on the first bad one.
pub(crate) fn all<T>(
    rows: &[PgRow],
    decode: fn(&PgRow) -> Result<T, StoreError>,
) -> Result<Vec<T>, StoreError> {
    rows.iter().map(decode).collect()
}
