//! Token table authenticator.

use standbook_core::UserId;
use standbook_core::auth::{ADMIN_ROLE, AuthError, Authenticator, Identity};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Authenticator backed by a fixed token → identity table.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthenticator {
    identities: HashMap<String, Identity>,
}

impl StaticAuthenticator {
    /// Empty table; every token is rejected.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `token` as a plain user.
    #[must_use]
    pub fn with_user(mut self, token: &str, user_id: &str, email: &str) -> Self {
        self.identities.insert(
            token.to_string(),
            Identity {
                user_id: UserId::new(user_id),
                email: Some(email.to_string()),
                roles: Vec::new(),
            },
        );
        self
    }

    /// Accept `token` as an administrator.
    #[must_use]
    pub fn with_admin(mut self, token: &str, user_id: &str) -> Self {
        self.identities.insert(
            token.to_string(),
            Identity {
                user_id: UserId::new(user_id),
                email: None,
                roles: vec![ADMIN_ROLE.to_string()],
            },
        );
        self
    }

    /// Shared trait object.
    #[must_use]
    pub fn into_dyn(self) -> Arc<dyn Authenticator> {
        Arc::new(self)
    }
}

impl Authenticator for StaticAuthenticator {
    fn authenticate<'a>(
        &'a self,
        token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Identity, AuthError>> + Send + 'a>> {
        let result = self
            .identities
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidCredential);
        Box::pin(std::future::ready(result))
    }
}
