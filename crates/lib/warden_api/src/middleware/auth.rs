//! Authentication middleware: Bearer token extraction and session validation.

use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use warden_core::auth::guard::require_permission;
use warden_core::models::auth::Principal;

use crate::AppState;
use crate::error::{AppError, AppResult};

/// The live principal behind the request's access token.
#[derive(Debug, Clone)]
pub struct AuthenticatedPrincipal(pub Principal);

impl AuthenticatedPrincipal {
    /// Fail with 403 unless the principal currently holds `permission`.
    pub fn require(&self, permission: &str) -> AppResult<()> {
        require_permission(&self.0, permission).map_err(AppError::from)
    }
}

/// Pull the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(request: &Request) -> AppResult<&str> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization scheme".into()))
}

/// Axum middleware: verifies the access token, reloads the principal from the
/// store, and injects [`AuthenticatedPrincipal`] into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&request)?.to_string();
    let principal = state.auth.validate(&token).await?;
    request
        .extensions_mut()
        .insert(AuthenticatedPrincipal(principal));

    Ok(next.run(request).await)
}
