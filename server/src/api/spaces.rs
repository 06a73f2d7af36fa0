//! Space API endpoints.
//!
//! - GET /api/plans/:id/spaces - Spaces on a plan
//! - POST /api/spaces - Create a space (admin)
//! - GET /api/spaces/:id - Space details
//! - PATCH /api/spaces/:id - Geometry, name, zone or price update (admin)
//! - DELETE /api/spaces/:id - Delete an unoccupied space (admin)
//! - PUT /api/spaces/:id/status - Force AVAILABLE / BLOCKED / PENDING / RESERVED (admin)

use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use standbook_core::{PlanId, Space, SpaceId, SpaceStatus};
use standbook_runtime::registry::{NewSpace, SpacePatch, SpaceState};
use standbook_web::{RequireAdmin, WebResult};
use uuid::Uuid;

/// Request to force a space status.
#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    /// Target status
    pub status: SpaceStatus,
    /// Holder name for reservations created on the way
    #[serde(default)]
    pub asignee: Option<String>,
}

/// Spaces on a plan.
///
/// # Errors
///
/// 503 when storage is unreachable.
pub async fn list_spaces(
    State(state): State<AppState>,
    Path(plan_id): Path<Uuid>,
) -> WebResult<Json<Vec<Space>>> {
    Ok(Json(
        state.registry.list_spaces(PlanId::from_uuid(plan_id)).await?,
    ))
}

/// Space details.
///
/// # Errors
///
/// 404 for an unknown space.
pub async fn get_space(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<Json<Space>> {
    Ok(Json(state.registry.get_space(SpaceId::from_uuid(id)).await?))
}

/// Create a space.
///
/// # Errors
///
/// 400 for invalid geometry or an unknown plan or zone.
pub async fn create_space(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(request): Json<NewSpace>,
) -> WebResult<(StatusCode, Json<Space>)> {
    let space = state.registry.create_space(request).await?;
    Ok((StatusCode::CREATED, Json(space)))
}

/// Update a space.
///
/// # Errors
///
/// 404 for an unknown space, 400 for invalid fields.
pub async fn update_space(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
    Json(patch): Json<SpacePatch>,
) -> WebResult<Json<Space>> {
    Ok(Json(
        state
            .registry
            .update_space(SpaceId::from_uuid(id), patch)
            .await?,
    ))
}

/// Delete a space.
///
/// # Errors
///
/// 409 while the space has an active reservation.
pub async fn delete_space(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
) -> WebResult<StatusCode> {
    state.registry.delete_space(SpaceId::from_uuid(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Force a space status through the reservation state machine.
///
/// # Example
///
/// ```bash
/// curl -X PUT http://localhost:8080/api/spaces/<id>/status \
///   -H "Authorization: Bearer <admin_token>" \
///   -H "Content-Type: application/json" \
///   -d '{"status": "RESERVED", "asignee": "Acme"}'
/// ```
///
/// # Errors
///
/// 409 when PENDING is requested for a reserved space, 400 when holding a
/// blocked space.
pub async fn set_space_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<Uuid>,
    Json(request): Json<SetStatusRequest>,
) -> WebResult<Json<SpaceState>> {
    let asignee = request
        .asignee
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| admin.display_name());

    let space_state = state
        .registry
        .set_space_status(
            SpaceId::from_uuid(id),
            request.status,
            Some(admin.user_id),
            &asignee,
        )
        .await?;
    Ok(Json(space_state))
}
