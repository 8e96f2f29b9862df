//! Session guard: presented access token → live [`Principal`].
//!
//! The token proves recent authentication; the principal is always reloaded
//! so deactivation and role changes take effect before the token expires.

use std::sync::Arc;

use tracing::debug;

use super::jwt::{TokenIssuer, subject_id};
use super::{AuthError, AuthResult, graph};
use crate::models::auth::{AccessClaims, Principal};
use crate::store::CredentialStore;

pub struct SessionGuard {
    store: Arc<dyn CredentialStore>,
    issuer: Arc<TokenIssuer>,
}

impl SessionGuard {
    pub fn new(store: Arc<dyn CredentialStore>, issuer: Arc<TokenIssuer>) -> Self {
        Self { store, issuer }
    }

    /// Verify signature and expiry only. Suitable for low-stakes UI decisions;
    /// the claims may be stale.
    pub fn claims(&self, token: &str) -> AuthResult<AccessClaims> {
        self.issuer.decode_access(token)
    }

    /// Verify the token and resolve its subject to an existing, active principal.
    pub async fn validate(&self, token: &str) -> AuthResult<Principal> {
        let claims = self.issuer.decode_access(token)?;
        let user_id = subject_id(&claims.sub)?;

        let Some(stored) = self.store.find_user_by_id(user_id).await? else {
            debug!(user_id, "rejected token: subject no longer exists");
            return Err(AuthError::TokenInvalid);
        };
        if !stored.user.active {
            debug!(user_id, "rejected token: subject deactivated");
            return Err(AuthError::TokenInvalid);
        }
        graph::resolve(self.store.as_ref(), stored).await
    }

    /// [`SessionGuard::validate`], then require `permission` on the freshly
    /// loaded roles.
    pub async fn authorize(&self, token: &str, permission: &str) -> AuthResult<Principal> {
        let principal = self.validate(token).await?;
        require_permission(&principal, permission)?;
        Ok(principal)
    }
}

/// Fail with `Forbidden` unless the principal currently holds `permission`.
pub fn require_permission(principal: &Principal, permission: &str) -> AuthResult<()> {
    if principal.has_permission(permission) {
        Ok(())
    } else {
        debug!(user_id = principal.id(), permission, "permission denied");
        Err(AuthError::Forbidden(permission.to_string()))
    }
}

/// Fail with `Forbidden` unless the principal holds at least one of `permissions`.
pub fn require_any_permission(principal: &Principal, permissions: &[&str]) -> AuthResult<()> {
    if principal.has_any_permission(permissions) {
        Ok(())
    } else {
        Err(AuthError::Forbidden(permissions.join(" | ")))
    }
}
