//! # warden_api
//!
//! HTTP API library for Warden.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use warden_core::auth::AuthResult;
use warden_core::auth::directory::Directory;
use warden_core::auth::service::AuthService;
use warden_core::config::AuthConfig;
use warden_core::store::CredentialStore;

use crate::handlers::{auth, roles, users};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Login, refresh and session validation.
    pub auth: Arc<AuthService>,
    /// User, role and permission administration.
    pub directory: Arc<Directory>,
}

impl AppState {
    pub fn new(store: Arc<dyn CredentialStore>, auth_config: &AuthConfig) -> AuthResult<Self> {
        Ok(Self {
            auth: Arc::new(AuthService::new(store.clone(), auth_config)?),
            directory: Arc::new(Directory::new(store, auth_config.bcrypt_cost)),
        })
    }
}

/// Run embedded database migrations.
///
/// Delegates to `warden_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    warden_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route(routes::POST_AUTH_LOGIN, post(auth::login_handler))
        .route(routes::POST_AUTH_REFRESH, post(auth::refresh_handler))
        .route(routes::POST_AUTH_LOGOUT, post(auth::logout_handler));

    // Protected routes (valid access token; handlers gate on permissions)
    let protected = Router::new()
        .route(routes::GET_AUTH_ME, get(auth::me_handler))
        .route(
            routes::USERS,
            get(users::list_users_handler).post(users::create_user_handler),
        )
        .route(
            routes::USERS_ID,
            get(users::get_user_handler).patch(users::update_user_handler),
        )
        .route(
            routes::POST_USERS_ID_DEACTIVATE,
            post(users::deactivate_user_handler),
        )
        .route(
            routes::POST_USERS_ID_ACTIVATE,
            post(users::activate_user_handler),
        )
        .route(
            routes::USERS_ID_ROLES_ROLE,
            put(users::assign_role_handler).delete(users::revoke_role_handler),
        )
        .route(
            routes::ROLES,
            get(roles::list_roles_handler).post(roles::create_role_handler),
        )
        .route(
            routes::ROLES_NAME,
            axum::routing::patch(roles::update_role_handler).delete(roles::delete_role_handler),
        )
        .route(
            routes::ROLES_NAME_PERMISSIONS_PERMISSION,
            put(roles::grant_permission_handler).delete(roles::revoke_permission_handler),
        )
        .route(
            routes::PERMISSIONS,
            get(roles::list_permissions_handler).post(roles::create_permission_handler),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(cors)
        .with_state(state)
}
