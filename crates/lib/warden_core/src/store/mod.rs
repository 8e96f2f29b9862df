//! Credential store: persistence of users, roles, permissions and their links.
//!
//! The trait is the seam between the auth flows and storage. [`PgStore`] is
//! the production backend; [`MemoryStore`] backs tests and local demos.
//!
//! Stores receive already-normalised emails and already-hashed secrets; they
//! never see plaintext.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::auth::AuthResult;
use crate::models::auth::{
    NewPermission, NewRole, Permission, PermissionId, Role, RoleId, RoleUpdate, StoredUser, User,
    UserId,
};

/// Row to insert for a new user.
#[derive(Debug, Clone)]
pub struct NewUserRecord {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub active: bool,
}

/// Column-level changes to a stored user.
///
/// `password_hash` is only ever `Some` when the caller explicitly changed the
/// secret; the store writes it verbatim.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<Option<String>>,
    pub avatar_url: Option<Option<String>>,
    pub active: Option<bool>,
    pub email_verified_at: Option<Option<DateTime<Utc>>>,
    pub password_hash: Option<String>,
}

impl UserChanges {
    /// Apply the changes in place and stamp `updated_at`.
    pub fn apply_to(self, stored: &mut StoredUser, now: DateTime<Utc>) {
        let user = &mut stored.user;
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(first_name) = self.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = self.last_name {
            user.last_name = last_name;
        }
        if let Some(phone) = self.phone {
            user.phone = phone;
        }
        if let Some(avatar_url) = self.avatar_url {
            user.avatar_url = avatar_url;
        }
        if let Some(active) = self.active {
            user.active = active;
        }
        if let Some(verified) = self.email_verified_at {
            user.email_verified_at = verified;
        }
        if let Some(hash) = self.password_hash {
            stored.password_hash = hash;
        }
        user.updated_at = now;
    }
}

/// Persistence operations required by the auth core.
///
/// Implementations must reject a duplicate email with
/// `AuthError::DuplicateEmail`, duplicate role/permission names with
/// `AuthError::Conflict`, and operations on missing rows with
/// `AuthError::NotFound`. Role and permission links have set semantics:
/// linking twice is a no-op.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> AuthResult<Option<StoredUser>>;

    async fn find_user_by_id(&self, id: UserId) -> AuthResult<Option<StoredUser>>;

    async fn list_users(&self) -> AuthResult<Vec<User>>;

    async fn insert_user(&self, record: NewUserRecord) -> AuthResult<User>;

    /// Apply `changes` atomically, serialised against other writes to the same user.
    async fn update_user(&self, id: UserId, changes: UserChanges) -> AuthResult<User>;

    async fn touch_last_login(&self, id: UserId, at: DateTime<Utc>) -> AuthResult<()>;

    /// Roles assigned to a user, each with its permissions loaded.
    async fn user_roles(&self, id: UserId) -> AuthResult<Vec<Role>>;

    async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> AuthResult<()>;

    async fn revoke_role(&self, user_id: UserId, role_id: RoleId) -> AuthResult<()>;

    async fn insert_role(&self, role: NewRole) -> AuthResult<Role>;

    async fn find_role_by_name(&self, name: &str) -> AuthResult<Option<Role>>;

    async fn list_roles(&self) -> AuthResult<Vec<Role>>;

    async fn update_role(&self, id: RoleId, changes: RoleUpdate) -> AuthResult<Role>;

    /// Delete a role and its user/permission links.
    async fn delete_role(&self, id: RoleId) -> AuthResult<()>;

    async fn insert_permission(&self, permission: NewPermission) -> AuthResult<Permission>;

    async fn find_permission_by_name(&self, name: &str) -> AuthResult<Option<Permission>>;

    async fn list_permissions(&self) -> AuthResult<Vec<Permission>>;

    async fn grant_permission(&self, role_id: RoleId, permission_id: PermissionId)
    -> AuthResult<()>;

    async fn revoke_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AuthResult<()>;
}
