//! Integration tests: build the router over an in-memory store seeded with
//! the system roles and an administrator, then drive it with `oneshot`.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;
use warden_api::AppState;
use warden_core::auth::directory::Directory;
use warden_core::bootstrap::{AdminSeed, bootstrap};
use warden_core::config::AuthConfig;
use warden_core::store::MemoryStore;

const ADMIN_EMAIL: &str = "root@isp.example";
const ADMIN_PASSWORD: &str = "admin-pass-1";

async fn app() -> Router {
    let store = Arc::new(MemoryStore::new());
    let mut auth_config = AuthConfig::new("router-test-secret-0123456789abcdef");
    auth_config.bcrypt_cost = 4;
    auth_config.max_login_attempts = 3;

    let directory = Directory::new(store.clone(), 4);
    bootstrap(
        &directory,
        Some(AdminSeed {
            email: ADMIN_EMAIL.into(),
            password: ADMIN_PASSWORD.into(),
            first_name: "Root".into(),
            last_name: "Admin".into(),
        }),
    )
    .await
    .expect("bootstrap");

    let state = AppState::new(store, &auth_config).expect("state");
    warden_api::router(state)
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, axum::http::HeaderMap, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.expect("request");
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("parse JSON")
    };
    (status, headers, json)
}

async fn login(app: &Router, email: &str, password: &str) -> Value {
    let (status, _, json) = call(
        app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {json}");
    json
}

fn access(json: &Value) -> String {
    json["accessToken"].as_str().expect("accessToken").to_string()
}

#[tokio::test]
async fn login_and_me_return_principal_view() {
    let app = app().await;
    let tokens = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    assert_eq!(tokens["tokenType"], "Bearer");
    assert!(tokens["refreshToken"].is_string());
    assert!(tokens["user"].get("passwordHash").is_none());

    let (status, _, me) = call(&app, Method::GET, "/auth/me", Some(&access(&tokens)), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], ADMIN_EMAIL);
    let roles = me["roles"].as_array().unwrap();
    assert!(roles.iter().any(|r| r == "admin"));
}

#[tokio::test]
async fn bad_password_and_unknown_email_are_indistinguishable() {
    let app = app().await;
    let (s1, _, wrong) = call(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": ADMIN_EMAIL, "password": "nope" })),
    )
    .await;
    let (s2, _, unknown) = call(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "ghost@isp.example", "password": "nope" })),
    )
    .await;
    assert_eq!(s1, StatusCode::UNAUTHORIZED);
    assert_eq!(s2, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong, unknown);
}

#[tokio::test]
async fn protected_routes_require_bearer_token() {
    let app = app().await;
    let (status, _, body) = call(&app, Method::GET, "/users", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _, _) = call(&app, Method::GET, "/users", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_token_is_not_an_access_token() {
    let app = app().await;
    let tokens = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let refresh = tokens["refreshToken"].as_str().unwrap();

    let (status, _, _) = call(&app, Method::GET, "/auth/me", Some(refresh), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, refreshed) = call(
        &app,
        Method::POST,
        "/auth/refresh",
        None,
        Some(json!({ "refreshToken": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) =
        call(&app, Method::GET, "/auth/me", Some(&access(&refreshed)), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn support_user_lifecycle() {
    let app = app().await;
    let admin = access(&login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await);

    let (status, _, created) = call(
        &app,
        Method::POST,
        "/users",
        Some(&admin),
        Some(json!({
            "email": "Alice@ISP.example",
            "password": "pw12345",
            "firstName": "Alice",
            "lastName": "Doe",
            "roles": ["support"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["email"], "alice@isp.example");
    let id = created["id"].as_i64().unwrap();

    let alice = access(&login(&app, "alice@isp.example", "pw12345").await);
    let (_, _, me) = call(&app, Method::GET, "/auth/me", Some(&alice), None).await;
    let perms = me["permissions"].as_array().unwrap();
    assert!(perms.iter().any(|p| p == "tickets:write"));

    // Support staff cannot administer users.
    let (status, _, _) = call(&app, Method::GET, "/users", Some(&alice), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Profile edit keeps the password working.
    let (status, _, _) = call(
        &app,
        Method::PATCH,
        &format!("/users/{id}"),
        Some(&admin),
        Some(json!({ "phone": "555-0100" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    login(&app, "alice@isp.example", "pw12345").await;

    // Deactivation kills the outstanding token immediately.
    let (status, _, _) = call(
        &app,
        Method::POST,
        &format!("/users/{id}/deactivate"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = call(&app, Method::GET, "/auth/me", Some(&alice), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn role_grants_take_effect_on_existing_tokens() {
    let app = app().await;
    let admin = access(&login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await);
    call(
        &app,
        Method::POST,
        "/users",
        Some(&admin),
        Some(json!({
            "email": "bob@isp.example",
            "password": "pw12345",
            "firstName": "Bob",
            "lastName": "Roe",
            "roles": ["billing"]
        })),
    )
    .await;
    let bob = access(&login(&app, "bob@isp.example", "pw12345").await);

    let (status, _, _) = call(&app, Method::GET, "/roles", Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, role) = call(
        &app,
        Method::PUT,
        "/roles/billing/permissions/roles:read",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        role["permissions"]
            .as_array()
            .unwrap()
            .iter()
            .any(|p| p["name"] == "roles:read")
    );

    let (status, _, _) = call(&app, Method::GET, "/roles", Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn conflicts_map_to_409() {
    let app = app().await;
    let admin = access(&login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await);

    let (status, _, body) = call(&app, Method::DELETE, "/roles/admin", Some(&admin), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, _, _) = call(
        &app,
        Method::POST,
        "/users",
        Some(&admin),
        Some(json!({
            "email": ADMIN_EMAIL.to_uppercase(),
            "password": "pw12345",
            "firstName": "Dup",
            "lastName": "Licate"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn custom_roles_can_be_created_and_deleted() {
    let app = app().await;
    let admin = access(&login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await);

    let (status, _, role) = call(
        &app,
        Method::POST,
        "/roles",
        Some(&admin),
        Some(json!({ "name": "noc", "displayName": "Network Ops" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(role["isSystem"], false);

    let (status, _, _) = call(&app, Method::DELETE, "/roles/noc", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _, _) = call(&app, Method::DELETE, "/roles/noc", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn repeated_failures_are_throttled() {
    let app = app().await;
    for _ in 0..3 {
        let (status, _, _) = call(
            &app,
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": ADMIN_EMAIL, "password": "wrong" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
    let (status, headers, _) = call(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(headers.contains_key(header::RETRY_AFTER));
}

#[tokio::test]
async fn logout_reports_success() {
    let app = app().await;
    let (status, _, body) = call(&app, Method::POST, "/auth/logout", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}
