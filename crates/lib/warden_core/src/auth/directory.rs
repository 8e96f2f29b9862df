//! Administrative operations on users, roles and permissions.
//!
//! Secrets are hashed here, before the store sees them, and only when the
//! caller says the secret changed.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::{AuthError, AuthResult, graph, password};
use crate::models::auth::{
    NewPermission, NewRole, NewUser, Permission, Principal, Role, RoleUpdate, SecretUpdate, User,
    UserId, UserUpdate, normalize_email,
};
use crate::store::{CredentialStore, NewUserRecord, UserChanges};

/// Minimum plaintext password length.
pub const MIN_PASSWORD_LEN: usize = 6;

fn validate_email(email: &str) -> AuthResult<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(AuthError::Validation(format!("invalid email '{email}'")))
    }
}

fn validate_password(password: &str) -> AuthResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Machine keys: lowercase ASCII letters, digits, `_` and `-`.
fn validate_key(kind: &str, key: &str) -> AuthResult<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(AuthError::Validation(format!("invalid {kind} '{key}'")))
    }
}

/// User, role and permission administration.
pub struct Directory {
    store: Arc<dyn CredentialStore>,
    bcrypt_cost: u32,
}

impl Directory {
    pub fn new(store: Arc<dyn CredentialStore>, bcrypt_cost: u32) -> Self {
        Self { store, bcrypt_cost }
    }

    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    /// Create a user, hashing the password and assigning the named roles.
    pub async fn create_user(&self, new: NewUser) -> AuthResult<Principal> {
        let email = normalize_email(&new.email);
        validate_email(&email)?;
        validate_password(&new.password)?;
        if new.first_name.trim().is_empty() {
            return Err(AuthError::Validation("first name is required".into()));
        }

        let mut roles = Vec::with_capacity(new.roles.len());
        for name in &new.roles {
            roles.push(self.role(name).await?);
        }

        let password_hash = password::hash_password_blocking(new.password, self.bcrypt_cost).await?;
        let user = self
            .store
            .insert_user(NewUserRecord {
                email,
                password_hash,
                first_name: new.first_name.trim().to_string(),
                last_name: new.last_name.trim().to_string(),
                phone: new.phone,
                avatar_url: new.avatar_url,
                active: new.active,
            })
            .await?;

        for role in &roles {
            self.store.assign_role(user.id, role.id).await?;
        }
        info!(user_id = user.id, roles = ?new.roles, "created user");
        self.get_user(user.id).await
    }

    /// Load a user with roles resolved. Unknown ids are `NotFound`.
    pub async fn get_user(&self, id: UserId) -> AuthResult<Principal> {
        let stored = self
            .store
            .find_user_by_id(id)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("user {id}")))?;
        graph::resolve(self.store.as_ref(), stored).await
    }

    pub async fn list_users(&self) -> AuthResult<Vec<User>> {
        self.store.list_users().await
    }

    pub async fn find_user_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let found = self.store.find_user_by_email(&normalize_email(email)).await?;
        Ok(found.map(|stored| stored.user))
    }

    /// Apply a profile update. The stored hash is rewritten only for
    /// `SecretUpdate::Changed`.
    pub async fn update_user(&self, id: UserId, update: UserUpdate) -> AuthResult<Principal> {
        let email = match update.email {
            Some(email) => {
                let email = normalize_email(&email);
                validate_email(&email)?;
                Some(email)
            }
            None => None,
        };
        let password_hash = match update.secret {
            SecretUpdate::Unchanged => None,
            SecretUpdate::Changed(plaintext) => {
                validate_password(&plaintext)?;
                Some(password::hash_password_blocking(plaintext, self.bcrypt_cost).await?)
            }
        };
        let changed_secret = password_hash.is_some();

        self.store
            .update_user(
                id,
                UserChanges {
                    email,
                    first_name: update.first_name,
                    last_name: update.last_name,
                    phone: update.phone,
                    avatar_url: update.avatar_url,
                    active: update.active,
                    email_verified_at: update.email_verified_at,
                    password_hash,
                },
            )
            .await?;
        info!(user_id = id, changed_secret, "updated user");
        self.get_user(id).await
    }

    pub async fn set_password(&self, id: UserId, plaintext: String) -> AuthResult<Principal> {
        let update = UserUpdate {
            secret: SecretUpdate::Changed(plaintext),
            ..Default::default()
        };
        self.update_user(id, update).await
    }

    /// Safe deletion path: the record stays, authentication stops.
    pub async fn deactivate_user(&self, id: UserId) -> AuthResult<Principal> {
        let update = UserUpdate {
            active: Some(false),
            ..Default::default()
        };
        self.update_user(id, update).await
    }

    pub async fn activate_user(&self, id: UserId) -> AuthResult<Principal> {
        let update = UserUpdate {
            active: Some(true),
            ..Default::default()
        };
        self.update_user(id, update).await
    }

    pub async fn mark_email_verified(&self, id: UserId) -> AuthResult<Principal> {
        let update = UserUpdate {
            email_verified_at: Some(Some(Utc::now())),
            ..Default::default()
        };
        self.update_user(id, update).await
    }

    pub async fn assign_role(&self, user_id: UserId, role_name: &str) -> AuthResult<Principal> {
        let role = self.role(role_name).await?;
        self.get_user(user_id).await?;
        self.store.assign_role(user_id, role.id).await?;
        info!(user_id, role = role_name, "assigned role");
        self.get_user(user_id).await
    }

    pub async fn revoke_role(&self, user_id: UserId, role_name: &str) -> AuthResult<Principal> {
        let role = self.role(role_name).await?;
        self.get_user(user_id).await?;
        self.store.revoke_role(user_id, role.id).await?;
        info!(user_id, role = role_name, "revoked role");
        self.get_user(user_id).await
    }

    // -----------------------------------------------------------------------
    // Roles
    // -----------------------------------------------------------------------

    pub async fn create_role(&self, new: NewRole) -> AuthResult<Role> {
        validate_key("role name", &new.name)?;
        let role = self.store.insert_role(new).await?;
        info!(role = %role.name, is_system = role.is_system, "created role");
        Ok(role)
    }

    pub async fn role(&self, name: &str) -> AuthResult<Role> {
        self.store
            .find_role_by_name(name)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("role '{name}'")))
    }

    pub async fn list_roles(&self) -> AuthResult<Vec<Role>> {
        self.store.list_roles().await
    }

    /// Update display fields; renaming a system role is refused.
    pub async fn update_role(&self, name: &str, changes: RoleUpdate) -> AuthResult<Role> {
        let role = self.role(name).await?;
        if let Some(new_name) = &changes.name {
            validate_key("role name", new_name)?;
            if role.is_system && new_name != &role.name {
                return Err(AuthError::SystemRole(role.name));
            }
        }
        self.store.update_role(role.id, changes).await
    }

    /// Delete a non-system role and its assignments.
    pub async fn delete_role(&self, name: &str) -> AuthResult<()> {
        let role = self.role(name).await?;
        if role.is_system {
            return Err(AuthError::SystemRole(role.name));
        }
        self.store.delete_role(role.id).await?;
        info!(role = name, "deleted role");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Permissions
    // -----------------------------------------------------------------------

    pub async fn create_permission(&self, new: NewPermission) -> AuthResult<Permission> {
        validate_key("resource", &new.resource)?;
        validate_key("action", &new.action)?;
        self.store.insert_permission(new).await
    }

    pub async fn list_permissions(&self) -> AuthResult<Vec<Permission>> {
        self.store.list_permissions().await
    }

    pub async fn permission(&self, name: &str) -> AuthResult<Permission> {
        self.store
            .find_permission_by_name(name)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("permission '{name}'")))
    }

    pub async fn grant_permission(&self, role_name: &str, permission: &str) -> AuthResult<Role> {
        let role = self.role(role_name).await?;
        let permission = self.permission(permission).await?;
        self.store.grant_permission(role.id, permission.id).await?;
        info!(role = role_name, permission = %permission.name, "granted permission");
        self.role(role_name).await
    }

    pub async fn revoke_permission(&self, role_name: &str, permission: &str) -> AuthResult<Role> {
        let role = self.role(role_name).await?;
        let permission = self.permission(permission).await?;
        self.store.revoke_permission(role.id, permission.id).await?;
        info!(role = role_name, permission = %permission.name, "revoked permission");
        self.role(role_name).await
    }

    /// Create a permission if missing, then return it.
    pub async fn ensure_permission(&self, resource: &str, action: &str) -> AuthResult<Permission> {
        let name = Permission::compose_name(resource, action);
        if let Some(existing) = self.store.find_permission_by_name(&name).await? {
            return Ok(existing);
        }
        self.create_permission(NewPermission {
            resource: resource.to_string(),
            action: action.to_string(),
            description: None,
        })
        .await
    }

    /// Create a role if missing, then return it.
    pub async fn ensure_role(&self, new: NewRole) -> AuthResult<Role> {
        if let Some(existing) = self.store.find_role_by_name(&new.name).await? {
            return Ok(existing);
        }
        self.create_role(new).await
    }
}
