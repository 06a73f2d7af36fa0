//! Floor plan API endpoints.
//!
//! - GET /api/plans?evento_id= - List plans, optionally of one event
//! - POST /api/plans - Create a plan (admin)
//! - GET /api/plans/:id - Plan with its spaces and zones
//! - PATCH /api/plans/:id - Metadata update (admin)
//! - DELETE /api/plans/:id - Delete with its spaces and zones (admin)

use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use standbook_core::{EventId, Plan, PlanId};
use standbook_runtime::registry::{NewPlan, PlanDetail, PlanPatch};
use standbook_web::{RequireAdmin, WebResult};
use uuid::Uuid;

/// Query parameters for listing plans.
#[derive(Debug, Default, Deserialize)]
pub struct ListPlansQuery {
    /// Only plans of this event
    #[serde(rename = "evento_id")]
    pub event_id: Option<Uuid>,
}

/// List plans.
///
/// # Errors
///
/// 503 when storage is unreachable.
pub async fn list_plans(
    State(state): State<AppState>,
    Query(query): Query<ListPlansQuery>,
) -> WebResult<Json<Vec<Plan>>> {
    let plans = state
        .registry
        .list_plans(query.event_id.map(EventId::from_uuid))
        .await?;
    Ok(Json(plans))
}

/// Plan with everything drawn on it.
///
/// # Errors
///
/// 404 for an unknown plan.
pub async fn get_plan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<Json<PlanDetail>> {
    Ok(Json(state.registry.get_plan(PlanId::from_uuid(id)).await?))
}

/// Create a plan.
///
/// # Errors
///
/// 400 for invalid dimensions or an unknown event.
pub async fn create_plan(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(request): Json<NewPlan>,
) -> WebResult<(StatusCode, Json<Plan>)> {
    let plan = state.registry.create_plan(request).await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

/// Update plan metadata.
///
/// # Errors
///
/// 404 for an unknown plan, 400 for invalid fields.
pub async fn update_plan(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
    Json(patch): Json<PlanPatch>,
) -> WebResult<Json<Plan>> {
    Ok(Json(
        state.registry.update_plan(PlanId::from_uuid(id), patch).await?,
    ))
}

/// Delete a plan with its spaces, zones and reservations.
///
/// # Errors
///
/// 404 for an unknown plan.
pub async fn delete_plan(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
) -> WebResult<StatusCode> {
    state.registry.delete_plan(PlanId::from_uuid(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
