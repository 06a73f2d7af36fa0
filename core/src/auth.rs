//! Authentication seam.
//!
//! Credentials are verified by an external identity service; Standbook only
//! needs the verified identity and its roles.

use crate::error::ReservationError;
use crate::types::UserId;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Role granting back-office operations.
pub const ADMIN_ROLE: &str = "Admin";

/// Errors that can occur while authenticating.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Token unknown, malformed or expired
    #[error("invalid or expired credential")]
    InvalidCredential,

    /// Identity backend cannot be reached
    #[error("authentication backend unavailable: {0}")]
    Unavailable(String),
}

impl From<AuthError> for ReservationError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidCredential => Self::Unauthenticated,
            AuthError::Unavailable(msg) => Self::Unavailable(msg),
        }
    }
}

/// A verified caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Subject
    pub user_id: UserId,
    /// Email claim, if any
    #[serde(default)]
    pub email: Option<String>,
    /// Role names
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Identity {
    /// Whether the identity carries `role`.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Whether the identity may run back-office operations.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }

    /// Name shown as the holder of reservations this identity makes.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.email
            .clone()
            .unwrap_or_else(|| self.user_id.to_string())
    }
}

/// Turns a bearer credential into an [`Identity`].
pub trait Authenticator: Send + Sync {
    /// Verify `token`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredential`] for unknown tokens and
    /// [`AuthError::Unavailable`] when the backend cannot be reached.
    fn authenticate<'a>(
        &'a self,
        token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Identity, AuthError>> + Send + 'a>>;
}
