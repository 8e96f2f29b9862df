//! Role and permission administration handlers, gated on `roles:read` /
//! `roles:write`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use warden_core::models::auth::{NewPermission, Permission, Role, RoleUpdate};

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedPrincipal;
use crate::models::CreateRoleRequest;

const READ: &str = "roles:read";
const WRITE: &str = "roles:write";

/// `GET /roles`
pub async fn list_roles_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedPrincipal>,
) -> AppResult<Json<Vec<Role>>> {
    caller.require(READ)?;
    Ok(Json(state.directory.list_roles().await?))
}

/// `POST /roles`
pub async fn create_role_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedPrincipal>,
    Json(body): Json<CreateRoleRequest>,
) -> AppResult<(StatusCode, Json<Role>)> {
    caller.require(WRITE)?;
    let role = state.directory.create_role(body.into()).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

/// `PATCH /roles/{name}`
pub async fn update_role_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedPrincipal>,
    Path(name): Path<String>,
    Json(body): Json<RoleUpdate>,
) -> AppResult<Json<Role>> {
    caller.require(WRITE)?;
    Ok(Json(state.directory.update_role(&name, body).await?))
}

/// `DELETE /roles/{name}`
pub async fn delete_role_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedPrincipal>,
    Path(name): Path<String>,
) -> AppResult<StatusCode> {
    caller.require(WRITE)?;
    state.directory.delete_role(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /roles/{name}/permissions/{permission}`
pub async fn grant_permission_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedPrincipal>,
    Path((name, permission)): Path<(String, String)>,
) -> AppResult<Json<Role>> {
    caller.require(WRITE)?;
    Ok(Json(state.directory.grant_permission(&name, &permission).await?))
}

/// `DELETE /roles/{name}/permissions/{permission}`
pub async fn revoke_permission_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedPrincipal>,
    Path((name, permission)): Path<(String, String)>,
) -> AppResult<Json<Role>> {
    caller.require(WRITE)?;
    Ok(Json(state.directory.revoke_permission(&name, &permission).await?))
}

/// `GET /permissions`
pub async fn list_permissions_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedPrincipal>,
) -> AppResult<Json<Vec<Permission>>> {
    caller.require(READ)?;
    Ok(Json(state.directory.list_permissions().await?))
}

/// `POST /permissions`
pub async fn create_permission_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedPrincipal>,
    Json(body): Json<NewPermission>,
) -> AppResult<(StatusCode, Json<Permission>)> {
    caller.require(WRITE)?;
    let permission = state.directory.create_permission(body).await?;
    Ok((StatusCode::CREATED, Json(permission)))
}
