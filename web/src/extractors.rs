//! Custom Axum extractors.
//!
//! - `CorrelationId`: request correlation id set by the middleware
//! - `BearerToken`: raw `Authorization: Bearer` credential
//! - `AuthUser`, `MaybeUser`, `RequireAdmin`: auth guards resolving the token
//!   through the `Authenticator` held in application state
//!
//! # Examples
//!
//! ```ignore
//! use standbook_web::extractors::{AuthUser, RequireAdmin};
//!
//! async fn my_reservations(AuthUser(identity): AuthUser, ...) -> WebResult<...> { ... }
//!
//! async fn confirm(RequireAdmin(admin): RequireAdmin, ...) -> WebResult<...> { ... }
//! ```

use crate::error::AppError;
use crate::middleware::CORRELATION_ID_HEADER;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use standbook_core::auth::{Authenticator, Identity};
use std::sync::Arc;
use uuid::Uuid;

/// Correlation ID for request tracing.
///
/// Taken from request extensions when the correlation layer is installed,
/// otherwise from the `X-Correlation-ID` header, otherwise freshly generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(id) = parts.extensions.get::<Self>() {
            return Ok(*id);
        }

        let correlation_id = parts
            .headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(correlation_id))
    }
}

/// Bearer credential from the `Authorization` header, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken(pub Option<String>);

impl BearerToken {
    /// Parse `Authorization: Bearer <token>`. Other schemes are ignored.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| {
                v.strip_prefix("Bearer ")
                    .or_else(|| v.strip_prefix("bearer "))
            })
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        Self(token)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

async fn identify<S>(parts: &Parts, state: &S) -> Result<Option<Identity>, AppError>
where
    Arc<dyn Authenticator>: FromRef<S>,
{
    let BearerToken(token) = BearerToken::from_headers(&parts.headers);
    let Some(token) = token else {
        return Ok(None);
    };

    let authenticator = Arc::<dyn Authenticator>::from_ref(state);
    let identity = authenticator.authenticate(&token).await?;
    tracing::debug!(user_id = %identity.user_id, "Authenticated request");
    Ok(Some(identity))
}

/// Authenticated caller; 401 without a valid token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<dyn Authenticator>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        identify(parts, state)
            .await?
            .map(Self)
            .ok_or_else(|| AppError::unauthorized("Authentication required"))
    }
}

/// Caller identity when a token is presented; anonymous requests pass.
///
/// A presented but invalid token is still rejected with 401.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<Identity>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
    Arc<dyn Authenticator>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        identify(parts, state).await.map(Self)
    }
}

/// Caller holding the `Admin` role; 401 without a token, 403 without the role.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
    Arc<dyn Authenticator>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(identity) = AuthUser::from_request_parts(parts, state).await?;
        if !identity.is_admin() {
            tracing::debug!(user_id = %identity.user_id, "Admin role required");
            return Err(AppError::forbidden("Administrator role required"));
        }
        Ok(Self(identity))
    }
}
