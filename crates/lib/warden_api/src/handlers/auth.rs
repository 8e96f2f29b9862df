//! Authentication request handlers.

use axum::extract::State;
use axum::{Extension, Json};
use warden_core::models::auth::{LoginResponse, PrincipalView, RefreshResponse};

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedPrincipal;
use crate::models::{LoginRequest, RefreshRequest, SuccessResponse};

/// `POST /auth/login`: authenticate with email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let resp = state.auth.login(&body.email, &body.password).await?;
    Ok(Json(resp))
}

/// `POST /auth/refresh`: exchange a refresh token for a new access token.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<RefreshResponse>> {
    let resp = state.auth.refresh(&body.refresh_token).await?;
    Ok(Json(resp))
}

/// `POST /auth/logout`: tokens are stateless; the client drops them.
pub async fn logout_handler(State(state): State<AppState>) -> Json<SuccessResponse> {
    state.auth.logout();
    Json(SuccessResponse { success: true })
}

/// `GET /auth/me`: the caller's current identity, roles and permissions.
pub async fn me_handler(
    Extension(principal): Extension<AuthenticatedPrincipal>,
) -> Json<PrincipalView> {
    Json(principal.0.view())
}
