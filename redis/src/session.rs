//! Session lookup for bearer tokens.
//!
//! The identity front-end writes one JSON record per session:
//!
//! ```text
//! auth:session:{token} → {"user_id": "...", "email": "...", "roles": ["Admin"]}
//! ```
//!
//! with a TTL matching the session lifetime. An absent key is an invalid
//! credential.

use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use standbook_core::auth::{AuthError, Authenticator, Identity};
use std::future::Future;
use std::pin::Pin;

/// Key namespace used by the identity front-end.
pub const DEFAULT_SESSION_PREFIX: &str = "auth:session:";

/// [`Authenticator`] resolving tokens against Redis session records.
#[derive(Clone)]
pub struct RedisSessionAuthenticator {
    conn_manager: ConnectionManager,
    prefix: String,
}

impl RedisSessionAuthenticator {
    /// Authenticator over an existing connection.
    #[must_use]
    pub fn new(conn_manager: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            conn_manager,
            prefix: prefix.into(),
        }
    }

    fn session_key(&self, token: &str) -> String {
        format!("{}{token}", self.prefix)
    }
}

impl Authenticator for RedisSessionAuthenticator {
    fn authenticate<'a>(
        &'a self,
        token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Identity, AuthError>> + Send + 'a>> {
        Box::pin(async move {
            if token.is_empty() {
                return Err(AuthError::InvalidCredential);
            }

            let mut conn = self.conn_manager.clone();
            let record: Option<String> = conn
                .get(self.session_key(token))
                .await
                .map_err(|e| AuthError::Unavailable(format!("Failed to read session: {e}")))?;

            let Some(record) = record else {
                tracing::debug!("Unknown session token");
                return Err(AuthError::InvalidCredential);
            };

            serde_json::from_str::<Identity>(&record).map_err(|e| {
                tracing::warn!(error = %e, "Malformed session record");
                AuthError::InvalidCredential
            })
        })
    }
}
