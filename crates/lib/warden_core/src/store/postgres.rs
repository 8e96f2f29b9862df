//! PostgreSQL credential store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{CredentialStore, NewUserRecord, UserChanges};
use crate::auth::{AuthError, AuthResult};
use crate::models::auth::{
    NewPermission, NewRole, Permission, PermissionId, Role, RoleId, RoleUpdate, StoredUser, User,
    UserId,
};

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, phone, avatar_url, \
     is_active, email_verified_at, last_login_at, created_at, updated_at";

const ROLE_COLUMNS: &str = "id, name, display_name, description, is_system, created_at, updated_at";

const PERMISSION_COLUMNS: &str = "id, name, resource, action, description, created_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    phone: Option<String>,
    avatar_url: Option<String>,
    is_active: bool,
    email_verified_at: Option<DateTime<Utc>>,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for StoredUser {
    fn from(row: UserRow) -> Self {
        StoredUser {
            user: User {
                id: row.id,
                email: row.email,
                first_name: row.first_name,
                last_name: row.last_name,
                phone: row.phone,
                avatar_url: row.avatar_url,
                active: row.is_active,
                email_verified_at: row.email_verified_at,
                last_login_at: row.last_login_at,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            password_hash: row.password_hash,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RoleRow {
    id: i64,
    name: String,
    display_name: String,
    description: Option<String>,
    is_system: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RoleRow {
    fn into_role(self, permissions: Vec<Permission>) -> Role {
        Role {
            id: self.id,
            name: self.name,
            display_name: self.display_name,
            description: self.description,
            is_system: self.is_system,
            permissions,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PermissionRow {
    id: i64,
    name: String,
    resource: String,
    action: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<PermissionRow> for Permission {
    fn from(row: PermissionRow) -> Self {
        Permission {
            id: row.id,
            name: row.name,
            resource: row.resource,
            action: row.action,
            description: row.description,
            created_at: row.created_at,
        }
    }
}

/// Map a unique-constraint violation to `conflict`, anything else to `DbError`.
fn on_unique(err: sqlx::Error, conflict: impl FnOnce() -> AuthError) -> AuthError {
    let is_unique = err
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation());
    if is_unique {
        conflict()
    } else {
        AuthError::DbError(err)
    }
}

/// Map a foreign-key violation to `NotFound(what)`.
fn on_missing_ref(err: sqlx::Error, what: String) -> AuthError {
    let is_fk = err
        .as_database_error()
        .is_some_and(|db| db.is_foreign_key_violation());
    if is_fk {
        AuthError::NotFound(what)
    } else {
        AuthError::DbError(err)
    }
}

/// Credential store backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Attach permissions to role rows with one extra query.
    async fn with_permissions(&self, rows: Vec<RoleRow>) -> AuthResult<Vec<Role>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let links = sqlx::query_as::<_, (i64, i64, String, String, String, Option<String>, DateTime<Utc>)>(
            "SELECT rp.role_id, p.id, p.name, p.resource, p.action, p.description, p.created_at \
             FROM role_permissions rp \
             JOIN permissions p ON p.id = rp.permission_id \
             WHERE rp.role_id = ANY($1) \
             ORDER BY p.id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_role: HashMap<i64, Vec<Permission>> = HashMap::new();
        for (role_id, id, name, resource, action, description, created_at) in links {
            by_role.entry(role_id).or_default().push(Permission {
                id,
                name,
                resource,
                action,
                description,
                created_at,
            });
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let perms = by_role.remove(&row.id).unwrap_or_default();
                row.into_role(perms)
            })
            .collect())
    }

    async fn role_by_id(&self, id: RoleId) -> AuthResult<Role> {
        let row = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AuthError::NotFound(format!("role {id}")))?;
        self.with_permissions(vec![row])
            .await?
            .pop()
            .ok_or_else(|| AuthError::NotFound(format!("role {id}")))
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> AuthResult<Option<StoredUser>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(StoredUser::from))
    }

    async fn find_user_by_id(&self, id: UserId) -> AuthResult<Option<StoredUser>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(StoredUser::from))
    }

    async fn list_users(&self) -> AuthResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| StoredUser::from(r).user).collect())
    }

    async fn insert_user(&self, record: NewUserRecord) -> AuthResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (email, password_hash, first_name, last_name, phone, avatar_url, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&record.email)
        .bind(&record.password_hash)
        .bind(&record.first_name)
        .bind(&record.last_name)
        .bind(&record.phone)
        .bind(&record.avatar_url)
        .bind(record.active)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| on_unique(e, || AuthError::DuplicateEmail))?;
        Ok(StoredUser::from(row).user)
    }

    async fn update_user(&self, id: UserId, changes: UserChanges) -> AuthResult<User> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AuthError::NotFound(format!("user {id}")))?;

        let mut stored = StoredUser::from(row);
        changes.apply_to(&mut stored, Utc::now());
        let user = &stored.user;

        sqlx::query(
            "UPDATE users SET email = $2, password_hash = $3, first_name = $4, last_name = $5, \
             phone = $6, avatar_url = $7, is_active = $8, email_verified_at = $9, updated_at = $10 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(&user.email)
        .bind(&stored.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone)
        .bind(&user.avatar_url)
        .bind(user.active)
        .bind(user.email_verified_at)
        .bind(user.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| on_unique(e, || AuthError::DuplicateEmail))?;

        tx.commit().await?;
        Ok(stored.user)
    }

    async fn touch_last_login(&self, id: UserId, at: DateTime<Utc>) -> AuthResult<()> {
        let result = sqlx::query("UPDATE users SET last_login_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    async fn user_roles(&self, id: UserId) -> AuthResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            "SELECT r.id, r.name, r.display_name, r.description, r.is_system, r.created_at, r.updated_at \
             FROM user_roles ur \
             JOIN roles r ON r.id = ur.role_id \
             WHERE ur.user_id = $1 \
             ORDER BY r.id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        self.with_permissions(rows).await
    }

    async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> AuthResult<()> {
        sqlx::query(
            "INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(role_id)
        .execute(&self.pool)
        .await
        .map_err(|e| on_missing_ref(e, format!("user {user_id} or role {role_id}")))?;
        Ok(())
    }

    async fn revoke_role(&self, user_id: UserId, role_id: RoleId) -> AuthResult<()> {
        sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
            .bind(user_id)
            .bind(role_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_role(&self, role: NewRole) -> AuthResult<Role> {
        let name = role.name.clone();
        let row = sqlx::query_as::<_, RoleRow>(&format!(
            "INSERT INTO roles (name, display_name, description, is_system) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {ROLE_COLUMNS}"
        ))
        .bind(&role.name)
        .bind(&role.display_name)
        .bind(&role.description)
        .bind(role.is_system)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| on_unique(e, || AuthError::Conflict(format!("role '{name}' already exists"))))?;
        Ok(row.into_role(Vec::new()))
    }

    async fn find_role_by_name(&self, name: &str) -> AuthResult<Option<Role>> {
        let row = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            None => Ok(None),
            Some(row) => Ok(self.with_permissions(vec![row]).await?.pop()),
        }
    }

    async fn list_roles(&self) -> AuthResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;
        self.with_permissions(rows).await
    }

    async fn update_role(&self, id: RoleId, changes: RoleUpdate) -> AuthResult<Role> {
        let conflict_name = changes.name.clone().unwrap_or_default();
        let result = sqlx::query(
            "UPDATE roles SET \
               name = COALESCE($2, name), \
               display_name = COALESCE($3, display_name), \
               description = CASE WHEN $4 THEN $5 ELSE description END, \
               updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.display_name)
        .bind(changes.description.is_some())
        .bind(changes.description.clone().flatten())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            on_unique(e, || {
                AuthError::Conflict(format!("role '{conflict_name}' already exists"))
            })
        })?;
        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound(format!("role {id}")));
        }
        self.role_by_id(id).await
    }

    async fn delete_role(&self, id: RoleId) -> AuthResult<()> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound(format!("role {id}")));
        }
        Ok(())
    }

    async fn insert_permission(&self, permission: NewPermission) -> AuthResult<Permission> {
        let name = permission.name();
        let row = sqlx::query_as::<_, PermissionRow>(&format!(
            "INSERT INTO permissions (name, resource, action, description) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {PERMISSION_COLUMNS}"
        ))
        .bind(&name)
        .bind(&permission.resource)
        .bind(&permission.action)
        .bind(&permission.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            on_unique(e, || {
                AuthError::Conflict(format!("permission '{name}' already exists"))
            })
        })?;
        Ok(row.into())
    }

    async fn find_permission_by_name(&self, name: &str) -> AuthResult<Option<Permission>> {
        let row = sqlx::query_as::<_, PermissionRow>(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Permission::from))
    }

    async fn list_permissions(&self) -> AuthResult<Vec<Permission>> {
        let rows = sqlx::query_as::<_, PermissionRow>(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions ORDER BY resource, action"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Permission::from).collect())
    }

    async fn grant_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AuthResult<()> {
        sqlx::query(
            "INSERT INTO role_permissions (role_id, permission_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(role_id)
        .bind(permission_id)
        .execute(&self.pool)
        .await
        .map_err(|e| on_missing_ref(e, format!("role {role_id} or permission {permission_id}")))?;
        Ok(())
    }

    async fn revoke_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AuthResult<()> {
        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1 AND permission_id = $2")
            .bind(role_id)
            .bind(permission_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
