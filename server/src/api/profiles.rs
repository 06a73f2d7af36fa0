//! User profile API endpoints.
//!
//! - GET /api/profiles/me - Caller's profile
//! - PUT /api/profiles/me - Create or update the caller's profile
//! - GET /api/profiles/me/complete - Whether the caller may reserve
//! - GET /api/profiles/:user_id - Any profile (admin)

use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use standbook_core::{ReservationError, UserId, UserProfile};
use standbook_runtime::registry::ProfileFields;
use standbook_web::{AuthUser, RequireAdmin, WebResult};

/// Profile completeness.
#[derive(Debug, Serialize)]
pub struct CompletenessResponse {
    /// `true` once the profile carries an email
    pub complete: bool,
    /// Fields still needed before reserving
    pub missing_fields: Vec<&'static str>,
}

/// The caller's profile.
///
/// # Errors
///
/// 404 until the caller saved a profile.
pub async fn my_profile(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> WebResult<Json<UserProfile>> {
    Ok(Json(state.registry.profile(&identity.user_id).await?))
}

/// Create or update the caller's profile.
///
/// Absent fields are kept, blank ones cleared. A first save without an email
/// takes the email from the verified identity.
///
/// # Errors
///
/// 503 when storage is unreachable.
pub async fn update_my_profile(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(mut fields): Json<ProfileFields>,
) -> WebResult<Json<UserProfile>> {
    if fields.email.is_none() {
        let first_save = match state.registry.profile(&identity.user_id).await {
            Ok(_) => false,
            Err(ReservationError::NotFound { .. }) => true,
            Err(e) => return Err(e.into()),
        };
        if first_save {
            fields.email = identity.email;
        }
    }
    Ok(Json(
        state
            .registry
            .upsert_profile(identity.user_id, fields)
            .await?,
    ))
}

/// Whether the caller's profile allows reserving.
///
/// # Errors
///
/// 503 when storage is unreachable.
pub async fn my_profile_complete(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> WebResult<Json<CompletenessResponse>> {
    let complete = state.registry.profile_complete(&identity.user_id).await?;
    let missing_fields = if complete { Vec::new() } else { vec!["email"] };
    Ok(Json(CompletenessResponse {
        complete,
        missing_fields,
    }))
}

/// Any user's profile.
///
/// # Errors
///
/// 404 for a user without a profile.
pub async fn get_profile(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(user_id): Path<String>,
) -> WebResult<Json<UserProfile>> {
    Ok(Json(state.registry.profile(&UserId::new(user_id)).await?))
}
