//! Zone API endpoints.
//!
//! - GET /api/plans/:id/zones - Zones on a plan
//! - POST /api/zones - Create a zone (admin)
//! - GET /api/zones/:id - Zone details
//! - PATCH /api/zones/:id - Update (admin)
//! - DELETE /api/zones/:id - Delete, detaching its spaces (admin)

use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use standbook_core::{PlanId, Zone, ZoneId};
use standbook_runtime::registry::{NewZone, ZonePatch};
use standbook_web::{RequireAdmin, WebResult};
use uuid::Uuid;

/// Zones on a plan.
///
/// # Errors
///
/// 503 when storage is unreachable.
pub async fn list_zones(
    State(state): State<AppState>,
    Path(plan_id): Path<Uuid>,
) -> WebResult<Json<Vec<Zone>>> {
    Ok(Json(
        state.registry.list_zones(PlanId::from_uuid(plan_id)).await?,
    ))
}

/// Zone details.
///
/// # Errors
///
/// 404 for an unknown zone.
pub async fn get_zone(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<Json<Zone>> {
    Ok(Json(state.registry.get_zone(ZoneId::from_uuid(id)).await?))
}

/// Create a zone.
///
/// # Errors
///
/// 400 for invalid geometry or an unknown plan.
pub async fn create_zone(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(request): Json<NewZone>,
) -> WebResult<(StatusCode, Json<Zone>)> {
    let zone = state.registry.create_zone(request).await?;
    Ok((StatusCode::CREATED, Json(zone)))
}

/// Update a zone.
///
/// # Errors
///
/// 404 for an unknown zone, 400 for invalid fields.
pub async fn update_zone(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
    Json(patch): Json<ZonePatch>,
) -> WebResult<Json<Zone>> {
    Ok(Json(
        state.registry.update_zone(ZoneId::from_uuid(id), patch).await?,
    ))
}

/// Delete a zone. Its spaces stay on the plan without a zone.
///
/// # Errors
///
/// 404 for an unknown zone.
pub async fn delete_zone(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
) -> WebResult<StatusCode> {
    state.registry.delete_zone(ZoneId::from_uuid(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
