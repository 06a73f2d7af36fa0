//! Reservation API endpoints.
//!
//! - POST /api/reservations - Create a reservation and place its hold (requires complete profile)
//! - GET /api/reservations/:id - Reservation details
//! - GET /api/reservations/:id/status - Record and hold marker diagnostics
//! - DELETE /api/reservations/:id - Cancel (owner or admin)
//! - POST /api/reservations/:id/hold - Extend the hold (owner or admin)
//! - POST /api/reservations/:id/request-cancellation - Ask an admin to cancel (owner)
//! - POST /api/reservations/:id/confirm - Confirm (admin)
//! - POST /api/reservations/:id/reject - Reject (admin)
//! - POST /api/reservations/:id/approve-cancellation - Approve a cancellation request (admin)
//! - POST /api/reservations/:id/deny-cancellation - Deny a cancellation request (admin)
//! - GET /api/reservations/mine - Caller's reservations
//! - GET /api/reservations/pending - Holds awaiting confirmation (admin)
//! - GET /api/reservations/cancellation-requests - Open cancellation requests (admin)
//! - GET /api/spaces/:id/reservations - Every reservation of a space
//! - GET /api/spaces/:id/reservations/active - The space's active reservation, or null

use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use standbook_core::{ReservationId, ReservationView, SpaceId};
use standbook_runtime::{Confirmation, ReservationStatus};
use standbook_web::{AppError, AuthUser, RequireAdmin, WebResult};
use std::time::Duration;
use uuid::Uuid;

// ============================================================================
// Request Types
// ============================================================================

/// Request to create a reservation.
#[derive(Debug, Deserialize)]
pub struct CreateReservationRequest {
    /// Space to hold
    pub space_id: Uuid,
    /// Name shown for the holder; defaults to the caller's display name
    #[serde(default)]
    pub asignee: Option<String>,
    /// Hold duration in seconds; absent or 0 uses the configured hold
    #[serde(default, alias = "ttl_seconds")]
    pub ttl_secs: Option<u64>,
}

/// Request to extend a hold.
#[derive(Debug, Default, Deserialize)]
pub struct RefreshHoldRequest {
    /// Hold duration in seconds; absent or 0 uses the configured hold
    #[serde(default, alias = "ttl_seconds")]
    pub ttl_secs: Option<u64>,
}

/// Hold to place for a requested duration.
///
/// Absent or zero means the configured hold. Non-admins are capped at the
/// configured maximum.
fn hold_ttl(state: &AppState, requested: Option<u64>, is_admin: bool) -> Duration {
    let ttl = requested
        .filter(|&secs| secs > 0)
        .map_or(state.hold_ttl, Duration::from_secs);
    if is_admin { ttl } else { ttl.min(state.max_hold_ttl) }
}

// ============================================================================
// Commands
// ============================================================================

/// Create a reservation and place its hold.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/api/reservations \
///   -H "Authorization: Bearer <session_token>" \
///   -H "Content-Type: application/json" \
///   -d '{"space_id": "6f1c...", "asignee": "Acme"}'
/// ```
///
/// # Errors
///
/// 403 `PROFILE_INCOMPLETE` until the caller's profile has an email, 409 if
/// the space is occupied, 400 for a blocked space.
pub async fn create_reservation(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(request): Json<CreateReservationRequest>,
) -> WebResult<(StatusCode, Json<ReservationView>)> {
    if !state.registry.profile_complete(&identity.user_id).await? {
        return Err(AppError::profile_incomplete());
    }

    let asignee = request
        .asignee
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| identity.display_name());
    let ttl = hold_ttl(&state, request.ttl_secs, identity.is_admin());

    let held = state
        .service
        .create_and_hold(
            SpaceId::from_uuid(request.space_id),
            Some(identity.user_id),
            &asignee,
            ttl,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(held)))
}

/// Cancel a reservation.
///
/// Owners may cancel their own PENDING or RESERVED reservation; admins any.
///
/// # Errors
///
/// 403 for someone else's reservation, 400 outside PENDING/RESERVED.
pub async fn cancel_reservation(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<Uuid>,
) -> WebResult<Json<ReservationView>> {
    let requester = (!identity.is_admin()).then_some(identity.user_id);
    let cancelled = state
        .service
        .cancel(ReservationId::from_uuid(id), requester)
        .await?;
    Ok(Json(cancelled))
}

/// Extend the hold on a PENDING reservation.
///
/// # Errors
///
/// 403 for someone else's reservation, 400 unless PENDING.
pub async fn refresh_hold(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<Uuid>,
    request: Option<Json<RefreshHoldRequest>>,
) -> WebResult<Json<ReservationView>> {
    let reservation_id = ReservationId::from_uuid(id);
    let current = state.service.get(reservation_id).await?;
    let owns = current.reservation.user_id.as_ref() == Some(&identity.user_id);
    if !owns && !identity.is_admin() {
        return Err(AppError::forbidden("Only the owner can extend this hold"));
    }

    let ttl = hold_ttl(
        &state,
        request.and_then(|Json(r)| r.ttl_secs),
        identity.is_admin(),
    );
    let refreshed = state.service.refresh_hold(reservation_id, ttl).await?;
    Ok(Json(refreshed))
}

/// Ask for a RESERVED reservation to be cancelled.
///
/// A PENDING reservation is cancelled outright.
///
/// # Errors
///
/// 403 unless the caller owns the reservation.
pub async fn request_cancellation(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<Uuid>,
) -> WebResult<Json<ReservationView>> {
    let updated = state
        .service
        .request_cancellation(ReservationId::from_uuid(id), identity.user_id)
        .await?;
    Ok(Json(updated))
}

/// Confirm a PENDING reservation.
///
/// The response carries `updated_space_name` when confirming renamed the
/// space after its occupant.
///
/// # Errors
///
/// 400 unless PENDING.
pub async fn confirm_reservation(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
) -> WebResult<Json<Confirmation>> {
    let confirmation = state
        .service
        .confirm(ReservationId::from_uuid(id))
        .await?;
    Ok(Json(confirmation))
}

/// Reject a PENDING reservation.
///
/// # Errors
///
/// 400 unless PENDING.
pub async fn reject_reservation(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
) -> WebResult<Json<ReservationView>> {
    let rejected = state.service.reject(ReservationId::from_uuid(id)).await?;
    Ok(Json(rejected))
}

/// Approve a cancellation request.
///
/// # Errors
///
/// 400 unless CANCELLATION_REQUESTED.
pub async fn approve_cancellation(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
) -> WebResult<Json<ReservationView>> {
    let cancelled = state
        .service
        .approve_cancellation(ReservationId::from_uuid(id))
        .await?;
    Ok(Json(cancelled))
}

/// Deny a cancellation request, restoring RESERVED.
///
/// # Errors
///
/// 400 unless CANCELLATION_REQUESTED.
pub async fn deny_cancellation(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
) -> WebResult<Json<ReservationView>> {
    let restored = state
        .service
        .deny_cancellation(ReservationId::from_uuid(id))
        .await?;
    Ok(Json(restored))
}

// ============================================================================
// Queries
// ============================================================================

/// Reservation details.
///
/// # Errors
///
/// 404 for an unknown reservation.
pub async fn get_reservation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<Json<ReservationView>> {
    Ok(Json(state.service.get(ReservationId::from_uuid(id)).await?))
}

/// Stored record and hold marker side by side.
///
/// # Errors
///
/// 503 when storage or the expiry store is unreachable.
pub async fn reservation_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<Json<ReservationStatus>> {
    Ok(Json(
        state.service.status(ReservationId::from_uuid(id)).await?,
    ))
}

/// The caller's reservations.
///
/// # Errors
///
/// 503 when storage is unreachable.
pub async fn my_reservations(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> WebResult<Json<Vec<ReservationView>>> {
    Ok(Json(state.service.list_for_user(&identity.user_id).await?))
}

/// Holds awaiting confirmation.
///
/// # Errors
///
/// 503 when storage is unreachable.
pub async fn pending_reservations(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> WebResult<Json<Vec<ReservationView>>> {
    Ok(Json(state.service.list_pending().await?))
}

/// Open cancellation requests.
///
/// # Errors
///
/// 503 when storage is unreachable.
pub async fn cancellation_requests(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> WebResult<Json<Vec<ReservationView>>> {
    Ok(Json(state.service.list_cancellation_requests().await?))
}

/// Every reservation of a space, oldest first.
///
/// # Errors
///
/// 503 when storage is unreachable.
pub async fn space_reservations(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<Json<Vec<ReservationView>>> {
    Ok(Json(
        state.service.list_by_space(SpaceId::from_uuid(id)).await?,
    ))
}

/// The space's active reservation, or `null`.
///
/// # Errors
///
/// 503 when storage is unreachable.
pub async fn active_space_reservation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<Json<Option<ReservationView>>> {
    Ok(Json(
        state.service.active_for_space(SpaceId::from_uuid(id)).await?,
    ))
}
