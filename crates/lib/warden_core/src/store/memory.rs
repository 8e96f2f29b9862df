//! In-memory credential store.
//!
//! All state sits behind one `RwLock`; every write holds the write guard for
//! its full read-check-write sequence, so uniqueness checks and per-user
//! updates are serialised.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{CredentialStore, NewUserRecord, UserChanges};
use crate::auth::{AuthError, AuthResult};
use crate::models::auth::{
    NewPermission, NewRole, Permission, PermissionId, Role, RoleId, RoleUpdate, StoredUser, User,
    UserId, normalize_email,
};

#[derive(Debug, Default)]
struct MemoryState {
    next_user_id: UserId,
    next_role_id: RoleId,
    next_permission_id: PermissionId,
    users: BTreeMap<UserId, StoredUser>,
    /// Roles stored without their permission list; filled on read.
    roles: BTreeMap<RoleId, Role>,
    permissions: BTreeMap<PermissionId, Permission>,
    user_roles: BTreeSet<(UserId, RoleId)>,
    role_permissions: BTreeSet<(RoleId, PermissionId)>,
}

impl MemoryState {
    fn email_taken(&self, email: &str, except: Option<UserId>) -> bool {
        let email = normalize_email(email);
        self.users
            .values()
            .any(|u| Some(u.user.id) != except && normalize_email(&u.user.email) == email)
    }

    fn role_name_taken(&self, name: &str, except: Option<RoleId>) -> bool {
        self.roles
            .values()
            .any(|r| Some(r.id) != except && r.name == name)
    }

    fn load_role(&self, id: RoleId) -> Option<Role> {
        let mut role = self.roles.get(&id)?.clone();
        role.permissions = self
            .role_permissions
            .range((id, PermissionId::MIN)..=(id, PermissionId::MAX))
            .filter_map(|(_, pid)| self.permissions.get(pid).cloned())
            .collect();
        Some(role)
    }

    fn require_user(&self, id: UserId) -> AuthResult<()> {
        if self.users.contains_key(&id) {
            Ok(())
        } else {
            Err(AuthError::NotFound(format!("user {id}")))
        }
    }

    fn require_role(&self, id: RoleId) -> AuthResult<()> {
        if self.roles.contains_key(&id) {
            Ok(())
        } else {
            Err(AuthError::NotFound(format!("role {id}")))
        }
    }
}

/// Credential store held entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current stored hash for a user; lets callers observe hashing behaviour.
    pub async fn password_hash(&self, id: UserId) -> Option<String> {
        self.state
            .read()
            .await
            .users
            .get(&id)
            .map(|u| u.password_hash.clone())
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> AuthResult<Option<StoredUser>> {
        let email = normalize_email(email);
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| normalize_email(&u.user.email) == email)
            .cloned())
    }

    async fn find_user_by_id(&self, id: UserId) -> AuthResult<Option<StoredUser>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn list_users(&self) -> AuthResult<Vec<User>> {
        let state = self.state.read().await;
        Ok(state.users.values().map(|u| u.user.clone()).collect())
    }

    async fn insert_user(&self, record: NewUserRecord) -> AuthResult<User> {
        let mut state = self.state.write().await;
        if state.email_taken(&record.email, None) {
            return Err(AuthError::DuplicateEmail);
        }
        state.next_user_id += 1;
        let now = Utc::now();
        let user = User {
            id: state.next_user_id,
            email: record.email,
            first_name: record.first_name,
            last_name: record.last_name,
            phone: record.phone,
            avatar_url: record.avatar_url,
            active: record.active,
            email_verified_at: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(
            user.id,
            StoredUser {
                user: user.clone(),
                password_hash: record.password_hash,
            },
        );
        Ok(user)
    }

    async fn update_user(&self, id: UserId, changes: UserChanges) -> AuthResult<User> {
        let mut state = self.state.write().await;
        state.require_user(id)?;
        if let Some(email) = &changes.email
            && state.email_taken(email, Some(id))
        {
            return Err(AuthError::DuplicateEmail);
        }
        let stored = state
            .users
            .get_mut(&id)
            .ok_or_else(|| AuthError::NotFound(format!("user {id}")))?;
        changes.apply_to(stored, Utc::now());
        Ok(stored.user.clone())
    }

    async fn touch_last_login(&self, id: UserId, at: DateTime<Utc>) -> AuthResult<()> {
        let mut state = self.state.write().await;
        let stored = state
            .users
            .get_mut(&id)
            .ok_or_else(|| AuthError::NotFound(format!("user {id}")))?;
        stored.user.last_login_at = Some(at);
        Ok(())
    }

    async fn user_roles(&self, id: UserId) -> AuthResult<Vec<Role>> {
        let state = self.state.read().await;
        Ok(state
            .user_roles
            .range((id, RoleId::MIN)..=(id, RoleId::MAX))
            .filter_map(|(_, rid)| state.load_role(*rid))
            .collect())
    }

    async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> AuthResult<()> {
        let mut state = self.state.write().await;
        state.require_user(user_id)?;
        state.require_role(role_id)?;
        state.user_roles.insert((user_id, role_id));
        Ok(())
    }

    async fn revoke_role(&self, user_id: UserId, role_id: RoleId) -> AuthResult<()> {
        let mut state = self.state.write().await;
        state.require_user(user_id)?;
        state.user_roles.remove(&(user_id, role_id));
        Ok(())
    }

    async fn insert_role(&self, role: NewRole) -> AuthResult<Role> {
        let mut state = self.state.write().await;
        if state.role_name_taken(&role.name, None) {
            return Err(AuthError::Conflict(format!("role '{}' already exists", role.name)));
        }
        state.next_role_id += 1;
        let now = Utc::now();
        let role = Role {
            id: state.next_role_id,
            name: role.name,
            display_name: role.display_name,
            description: role.description,
            is_system: role.is_system,
            permissions: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        state.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn find_role_by_name(&self, name: &str) -> AuthResult<Option<Role>> {
        let state = self.state.read().await;
        Ok(state
            .roles
            .values()
            .find(|r| r.name == name)
            .and_then(|r| state.load_role(r.id)))
    }

    async fn list_roles(&self) -> AuthResult<Vec<Role>> {
        let state = self.state.read().await;
        Ok(state
            .roles
            .keys()
            .filter_map(|id| state.load_role(*id))
            .collect())
    }

    async fn update_role(&self, id: RoleId, changes: RoleUpdate) -> AuthResult<Role> {
        let mut state = self.state.write().await;
        state.require_role(id)?;
        if let Some(name) = &changes.name
            && state.role_name_taken(name, Some(id))
        {
            return Err(AuthError::Conflict(format!("role '{name}' already exists")));
        }
        if let Some(role) = state.roles.get_mut(&id) {
            if let Some(name) = changes.name {
                role.name = name;
            }
            if let Some(display_name) = changes.display_name {
                role.display_name = display_name;
            }
            if let Some(description) = changes.description {
                role.description = description;
            }
            role.updated_at = Utc::now();
        }
        state
            .load_role(id)
            .ok_or_else(|| AuthError::NotFound(format!("role {id}")))
    }

    async fn delete_role(&self, id: RoleId) -> AuthResult<()> {
        let mut state = self.state.write().await;
        state.require_role(id)?;
        state.roles.remove(&id);
        state.user_roles.retain(|(_, rid)| *rid != id);
        state.role_permissions.retain(|(rid, _)| *rid != id);
        Ok(())
    }

    async fn insert_permission(&self, permission: NewPermission) -> AuthResult<Permission> {
        let mut state = self.state.write().await;
        let name = permission.name();
        if state.permissions.values().any(|p| p.name == name) {
            return Err(AuthError::Conflict(format!("permission '{name}' already exists")));
        }
        state.next_permission_id += 1;
        let permission = Permission {
            id: state.next_permission_id,
            name,
            resource: permission.resource,
            action: permission.action,
            description: permission.description,
            created_at: Utc::now(),
        };
        state.permissions.insert(permission.id, permission.clone());
        Ok(permission)
    }

    async fn find_permission_by_name(&self, name: &str) -> AuthResult<Option<Permission>> {
        let state = self.state.read().await;
        Ok(state.permissions.values().find(|p| p.name == name).cloned())
    }

    async fn list_permissions(&self) -> AuthResult<Vec<Permission>> {
        Ok(self.state.read().await.permissions.values().cloned().collect())
    }

    async fn grant_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AuthResult<()> {
        let mut state = self.state.write().await;
        state.require_role(role_id)?;
        if !state.permissions.contains_key(&permission_id) {
            return Err(AuthError::NotFound(format!("permission {permission_id}")));
        }
        state.role_permissions.insert((role_id, permission_id));
        Ok(())
    }

    async fn revoke_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AuthResult<()> {
        let mut state = self.state.write().await;
        state.require_role(role_id)?;
        state.role_permissions.remove(&(role_id, permission_id));
        Ok(())
    }
}
