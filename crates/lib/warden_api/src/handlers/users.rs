//! User administration handlers. Reads need `users:read`, writes `users:write`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use warden_core::models::auth::{NewUser, PrincipalView, User, UserId};

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedPrincipal;
use crate::models::UpdateUserRequest;

const READ: &str = "users:read";
const WRITE: &str = "users:write";

/// `GET /users`
pub async fn list_users_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedPrincipal>,
) -> AppResult<Json<Vec<User>>> {
    caller.require(READ)?;
    Ok(Json(state.directory.list_users().await?))
}

/// `POST /users`
pub async fn create_user_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedPrincipal>,
    Json(body): Json<NewUser>,
) -> AppResult<(StatusCode, Json<PrincipalView>)> {
    caller.require(WRITE)?;
    let created = state.directory.create_user(body).await?;
    Ok((StatusCode::CREATED, Json(created.view())))
}

/// `GET /users/{id}`
pub async fn get_user_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedPrincipal>,
    Path(id): Path<UserId>,
) -> AppResult<Json<PrincipalView>> {
    caller.require(READ)?;
    Ok(Json(state.directory.get_user(id).await?.view()))
}

/// `PATCH /users/{id}`
pub async fn update_user_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedPrincipal>,
    Path(id): Path<UserId>,
    Json(body): Json<UpdateUserRequest>,
) -> AppResult<Json<PrincipalView>> {
    caller.require(WRITE)?;
    let updated = state.directory.update_user(id, body.into()).await?;
    Ok(Json(updated.view()))
}

/// `POST /users/{id}/deactivate`
pub async fn deactivate_user_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedPrincipal>,
    Path(id): Path<UserId>,
) -> AppResult<Json<PrincipalView>> {
    caller.require(WRITE)?;
    Ok(Json(state.directory.deactivate_user(id).await?.view()))
}

/// `POST /users/{id}/activate`
pub async fn activate_user_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedPrincipal>,
    Path(id): Path<UserId>,
) -> AppResult<Json<PrincipalView>> {
    caller.require(WRITE)?;
    Ok(Json(state.directory.activate_user(id).await?.view()))
}

/// `PUT /users/{id}/roles/{role}`
pub async fn assign_role_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedPrincipal>,
    Path((id, role)): Path<(UserId, String)>,
) -> AppResult<Json<PrincipalView>> {
    caller.require(WRITE)?;
    Ok(Json(state.directory.assign_role(id, &role).await?.view()))
}

/// `DELETE /users/{id}/roles/{role}`
pub async fn revoke_role_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedPrincipal>,
    Path((id, role)): Path<(UserId, String)>,
) -> AppResult<Json<PrincipalView>> {
    caller.require(WRITE)?;
    Ok(Json(state.directory.revoke_role(id, &role).await?.view()))
}
