//! Login, refresh, validate and logout flows.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::authenticator::Authenticator;
use super::guard::SessionGuard;
use super::jwt::{TokenIssuer, subject_id};
use super::throttle::LoginThrottle;
use super::{AuthError, AuthResult, graph};
use crate::config::AuthConfig;
use crate::models::auth::{LoginResponse, Principal, RefreshResponse};
use crate::store::CredentialStore;

const TOKEN_TYPE: &str = "Bearer";

/// Entry point for the authentication flows.
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    authenticator: Authenticator,
    issuer: Arc<TokenIssuer>,
    throttle: Arc<LoginThrottle>,
    guard: SessionGuard,
}

impl AuthService {
    pub fn new(store: Arc<dyn CredentialStore>, config: &AuthConfig) -> AuthResult<Self> {
        let issuer = Arc::new(TokenIssuer::from_config(config));
        let throttle = Arc::new(LoginThrottle::from_config(config));
        let authenticator = Authenticator::new(store.clone(), throttle.clone(), config.bcrypt_cost)?;
        let guard = SessionGuard::new(store.clone(), issuer.clone());
        Ok(Self {
            store,
            authenticator,
            issuer,
            throttle,
            guard,
        })
    }

    pub fn guard(&self) -> &SessionGuard {
        &self.guard
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    /// Authenticate and mint an access/refresh token pair.
    ///
    /// Records the issuance time as the user's `last_login_at`.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<LoginResponse> {
        let mut principal = self.authenticator.authenticate(email, password).await?;

        let now = Utc::now();
        let (access_token, _) = self.issuer.issue_access(&principal, now)?;
        let (refresh_token, _) = self.issuer.issue_refresh(principal.id(), now)?;

        self.store.touch_last_login(principal.id(), now).await?;
        principal.user.last_login_at = Some(now);

        info!(user_id = principal.id(), "issued token pair");
        Ok(LoginResponse {
            access_token,
            refresh_token,
            token_type: TOKEN_TYPE.to_string(),
            expires_in: self.issuer.access_ttl().num_seconds(),
            user: principal.view(),
        })
    }

    /// Exchange a refresh token for a new access token with current claims.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<RefreshResponse> {
        let claims = self.issuer.decode_refresh(refresh_token)?;
        let user_id = subject_id(&claims.sub)?;

        let stored = match self.store.find_user_by_id(user_id).await? {
            Some(stored) if stored.user.active => stored,
            _ => {
                debug!(user_id, "refresh refused: subject missing or inactive");
                return Err(AuthError::TokenInvalid);
            }
        };
        let principal = graph::resolve(self.store.as_ref(), stored).await?;
        let (access_token, _) = self.issuer.issue_access(&principal, Utc::now())?;

        Ok(RefreshResponse {
            access_token,
            token_type: TOKEN_TYPE.to_string(),
            expires_in: self.issuer.access_ttl().num_seconds(),
        })
    }

    /// Resolve an access token to a live principal.
    pub async fn validate(&self, access_token: &str) -> AuthResult<Principal> {
        self.guard.validate(access_token).await
    }

    /// Tokens are discarded client-side; nothing is revoked server-side.
    pub fn logout(&self) {}

    /// Drop lapsed login-throttle windows.
    pub fn prune_throttle(&self) {
        self.throttle.prune(Utc::now());
    }
}
