//! Event management API endpoints.
//!
//! - GET /api/events - List events (visible ones only unless admin)
//! - POST /api/events - Create an event (admin)
//! - GET /api/events/:id - Event details
//! - PATCH /api/events/:id - Partial update (admin)
//! - DELETE /api/events/:id - Delete with its plans (admin)

use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use standbook_core::{Event, EventId};
use standbook_runtime::registry::{EventPatch, NewEvent};
use standbook_web::{MaybeUser, RequireAdmin, WebResult};
use uuid::Uuid;

/// List events. Hidden events are listed to admins only.
///
/// # Errors
///
/// 503 when storage is unreachable.
pub async fn list_events(
    State(state): State<AppState>,
    MaybeUser(identity): MaybeUser,
) -> WebResult<Json<Vec<Event>>> {
    let visible_only = !identity.is_some_and(|i| i.is_admin());
    Ok(Json(state.registry.list_events(visible_only).await?))
}

/// Event details.
///
/// # Errors
///
/// 404 for an unknown event.
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<Json<Event>> {
    Ok(Json(state.registry.get_event(EventId::from_uuid(id)).await?))
}

/// Create an event.
///
/// # Errors
///
/// 400 for a blank name or an inverted reservation window.
pub async fn create_event(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(request): Json<NewEvent>,
) -> WebResult<(StatusCode, Json<Event>)> {
    let event = state.registry.create_event(request).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// Update an event.
///
/// # Errors
///
/// 404 for an unknown event, 400 for invalid fields.
pub async fn update_event(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
    Json(patch): Json<EventPatch>,
) -> WebResult<Json<Event>> {
    Ok(Json(
        state
            .registry
            .update_event(EventId::from_uuid(id), patch)
            .await?,
    ))
}

/// Delete an event with its plans, spaces, zones and reservations.
///
/// # Errors
///
/// 404 for an unknown event.
pub async fn delete_event(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
) -> WebResult<StatusCode> {
    state.registry.delete_event(EventId::from_uuid(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
