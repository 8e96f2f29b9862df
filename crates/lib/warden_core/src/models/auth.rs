//! Identity and access-control domain models.
//!
//! Three user shapes:
//!
//! - [`User`]: identity and profile only. Safe to serialise.
//! - [`StoredUser`]: identity plus the bcrypt hash. Never serialised.
//! - [`Principal`]: identity plus the resolved role/permission graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type RoleId = i64;
pub type PermissionId = i64;

/// Lowercase and trim an email so lookups compare case-insensitively.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Domain user (no secret).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub active: bool,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn is_verified(&self) -> bool {
        self.email_verified_at.is_some()
    }
}

/// User with password hash (for internal auth flows).
#[derive(Clone)]
pub struct StoredUser {
    pub user: User,
    pub password_hash: String,
}

impl std::fmt::Debug for StoredUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredUser")
            .field("user", &self.user)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

/// An atomic `resource:action` capability grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: PermissionId,
    pub name: String,
    pub resource: String,
    pub action: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Permission {
    /// Conventional machine name for a resource/action pair.
    pub fn compose_name(resource: &str, action: &str) -> String {
        format!("{resource}:{action}")
    }
}

/// A named bundle of permissions, loaded with its permission set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    /// Bootstrap roles cannot be deleted or renamed.
    pub is_system: bool,
    pub permissions: Vec<Permission>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user together with the roles (and their permissions) currently assigned.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user: User,
    pub roles: Vec<Role>,
}

impl Principal {
    pub fn id(&self) -> UserId {
        self.user.id
    }

    pub fn is_active(&self) -> bool {
        self.user.active
    }

    /// Outward representation. Never carries the secret.
    pub fn view(&self) -> PrincipalView {
        PrincipalView {
            id: self.user.id,
            email: self.user.email.clone(),
            first_name: self.user.first_name.clone(),
            last_name: self.user.last_name.clone(),
            full_name: self.user.full_name(),
            phone: self.user.phone.clone(),
            avatar_url: self.user.avatar_url.clone(),
            active: self.user.active,
            email_verified: self.user.is_verified(),
            last_login_at: self.user.last_login_at,
            roles: crate::auth::graph::roles_of(self).into_iter().collect(),
            permissions: crate::auth::graph::permissions_of(self).into_iter().collect(),
        }
    }
}

/// Serialisable principal returned to callers after login or from `/auth/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalView {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub active: bool,
    pub email_verified: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

/// Input for creating a user. `password` is plaintext and hashed before storage.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    /// Role names assigned right after creation.
    #[serde(default)]
    pub roles: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// Whether an update carries a new secret.
///
/// The caller decides; the stored value is never inspected to guess whether it
/// is already hashed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SecretUpdate {
    #[default]
    Unchanged,
    Changed(String),
}

/// Partial profile update. `None` leaves the field untouched; for nullable
/// fields `Some(None)` clears the value.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<Option<String>>,
    pub avatar_url: Option<Option<String>>,
    pub active: Option<bool>,
    pub email_verified_at: Option<Option<DateTime<Utc>>>,
    pub secret: SecretUpdate,
}

/// Input for creating a role.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRole {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_system: bool,
}

/// Partial role update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<Option<String>>,
}

/// Input for creating a permission; the name is derived as `resource:action`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPermission {
    pub resource: String,
    pub action: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewPermission {
    pub fn name(&self) -> String {
        Permission::compose_name(&self.resource, &self.action)
    }
}

/// Discriminates access from refresh tokens so one cannot stand in for the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims embedded in access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject: user ID (standard JWT `sub` claim).
    pub sub: String,
    pub email: String,
    /// Role names at issuance time.
    pub roles: Vec<String>,
    /// Flattened, deduplicated permission names at issuance time.
    pub permissions: Vec<String>,
    pub typ: TokenKind,
    /// Expiry (unix timestamp).
    pub exp: i64,
    /// Issued at (unix timestamp).
    pub iat: i64,
}

/// JWT claims embedded in refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub typ: TokenKind,
    pub exp: i64,
    pub iat: i64,
}

/// Result of a successful login.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub user: PrincipalView,
}

/// Result of a refresh.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: UserId, email: &str) -> User {
        let now = Utc::now();
        User {
            id,
            email: email.to_string(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            phone: None,
            avatar_url: None,
            active: true,
            email_verified_at: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn normalize_email_lowercases_and_trims() {
        assert_eq!(normalize_email("  Alice@X.com "), "alice@x.com");
    }

    #[test]
    fn full_name_joins_and_trims() {
        let mut u = user(1, "a@x.com");
        assert_eq!(u.full_name(), "Ada Lovelace");
        u.last_name = String::new();
        assert_eq!(u.full_name(), "Ada");
    }

    #[test]
    fn stored_user_debug_redacts_hash() {
        let stored = StoredUser {
            user: user(1, "a@x.com"),
            password_hash: "$2b$04$abcdefghijklmnopqrstuv".into(),
        };
        let dbg = format!("{stored:?}");
        assert!(!dbg.contains("$2b$"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn permission_name_is_resource_action() {
        let p = NewPermission {
            resource: "customers".into(),
            action: "read".into(),
            description: None,
        };
        assert_eq!(p.name(), "customers:read");
    }

    #[test]
    fn user_json_has_no_secret_field() {
        let json = serde_json::to_value(user(7, "a@x.com")).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["email"], "a@x.com");
    }

    #[test]
    fn token_kind_serialises_lowercase() {
        assert_eq!(
            serde_json::to_string(&TokenKind::Refresh).unwrap(),
            "\"refresh\""
        );
    }
}
