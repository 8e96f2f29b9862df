//! Request and response bodies specific to the HTTP surface.
//!
//! Domain shapes (`PrincipalView`, `Role`, `Permission`, `LoginResponse`, ...)
//! come straight from `warden_core`.

use serde::{Deserialize, Deserializer, Serialize};
use warden_core::models::auth::{NewRole, SecretUpdate, UserUpdate};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Present-but-null becomes `Some(None)`; absent stays `None` via `default`.
fn nullable<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// `PATCH /users/{id}` body. A `password` field is the only way to change the
/// stored secret.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub avatar_url: Option<Option<String>>,
    #[serde(default)]
    pub password: Option<String>,
}

impl From<UpdateUserRequest> for UserUpdate {
    fn from(req: UpdateUserRequest) -> Self {
        UserUpdate {
            email: req.email,
            first_name: req.first_name,
            last_name: req.last_name,
            phone: req.phone,
            avatar_url: req.avatar_url,
            secret: match req.password {
                Some(plaintext) => SecretUpdate::Changed(plaintext),
                None => SecretUpdate::Unchanged,
            },
            ..Default::default()
        }
    }
}

/// `POST /roles` body. Roles created over HTTP are never system roles.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoleRequest {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl From<CreateRoleRequest> for NewRole {
    fn from(req: CreateRoleRequest) -> Self {
        NewRole {
            name: req.name,
            display_name: req.display_name,
            description: req.description,
            is_system: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_patch_without_password_keeps_secret() {
        let req: UpdateUserRequest = serde_json::from_str(r#"{"phone":"555"}"#).unwrap();
        let update = UserUpdate::from(req);
        assert_eq!(update.secret, SecretUpdate::Unchanged);
        assert_eq!(update.phone, Some(Some("555".into())));
        assert_eq!(update.avatar_url, None);
    }

    #[test]
    fn explicit_null_clears_nullable_field() {
        let req: UpdateUserRequest = serde_json::from_str(r#"{"avatarUrl":null}"#).unwrap();
        assert_eq!(req.avatar_url, Some(None));
    }

    #[test]
    fn password_field_marks_secret_changed() {
        let req: UpdateUserRequest = serde_json::from_str(r#"{"password":"n3w-secret"}"#).unwrap();
        assert_eq!(
            UserUpdate::from(req).secret,
            SecretUpdate::Changed("n3w-secret".into())
        );
    }

    #[test]
    fn http_roles_are_never_system() {
        let req: CreateRoleRequest =
            serde_json::from_str(r#"{"name":"noc","displayName":"NOC","isSystem":true}"#).unwrap();
        assert!(!NewRole::from(req).is_system);
    }
}
