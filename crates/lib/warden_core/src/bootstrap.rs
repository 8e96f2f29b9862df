//! Seeding of the built-in roles, their permissions, and the first administrator.
//!
//! Every step is idempotent: existing roles, permissions and links are left
//! as they are, and an existing admin account keeps its password.

use tracing::info;

use crate::auth::AuthResult;
use crate::auth::directory::Directory;
use crate::models::auth::{NewRole, NewUser, Principal, normalize_email};

/// Resources every deployment manages.
pub const RESOURCES: &[&str] = &["users", "roles", "customers", "billing", "tickets", "nas"];

pub const ACTIONS: &[&str] = &["read", "write"];

/// A built-in role and the permission names it carries.
pub struct SystemRole {
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub permissions: &'static [&'static str],
}

pub const ADMIN_ROLE: &str = "admin";

pub const SYSTEM_ROLES: &[SystemRole] = &[
    SystemRole {
        name: ADMIN_ROLE,
        display_name: "Administrator",
        description: "Full access to every resource",
        permissions: &[
            "users:read",
            "users:write",
            "roles:read",
            "roles:write",
            "customers:read",
            "customers:write",
            "billing:read",
            "billing:write",
            "tickets:read",
            "tickets:write",
            "nas:read",
            "nas:write",
        ],
    },
    SystemRole {
        name: "support",
        display_name: "Support",
        description: "Handles customer tickets",
        permissions: &["tickets:read", "tickets:write", "customers:read"],
    },
    SystemRole {
        name: "billing",
        display_name: "Billing",
        description: "Manages invoices and payments",
        permissions: &["billing:read", "billing:write", "customers:read"],
    },
];

/// Credentials for the first administrator.
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// What a bootstrap run created.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub permissions: usize,
    pub roles: usize,
    pub admin_created: bool,
}

/// Ensure every resource/action permission exists and every system role
/// carries its permissions. Returns the number of system roles.
pub async fn seed_system_roles(directory: &Directory) -> AuthResult<usize> {
    for resource in RESOURCES {
        for action in ACTIONS {
            directory.ensure_permission(resource, action).await?;
        }
    }

    for spec in SYSTEM_ROLES {
        directory
            .ensure_role(NewRole {
                name: spec.name.to_string(),
                display_name: spec.display_name.to_string(),
                description: Some(spec.description.to_string()),
                is_system: true,
            })
            .await?;
        for permission in spec.permissions {
            directory.grant_permission(spec.name, permission).await?;
        }
    }
    Ok(SYSTEM_ROLES.len())
}

/// Seed system roles, then create the admin account unless the email exists.
/// An existing account is (re)assigned the admin role.
pub async fn bootstrap(
    directory: &Directory,
    admin: Option<AdminSeed>,
) -> AuthResult<BootstrapReport> {
    let permissions_before = directory.list_permissions().await?.len();
    let roles = seed_system_roles(directory).await?;
    let permissions = directory.list_permissions().await?.len() - permissions_before;

    let mut report = BootstrapReport {
        permissions,
        roles,
        admin_created: false,
    };

    if let Some(admin) = admin {
        let (_, created) = ensure_admin(directory, admin).await?;
        report.admin_created = created;
    }
    info!(?report, "bootstrap complete");
    Ok(report)
}

async fn ensure_admin(directory: &Directory, seed: AdminSeed) -> AuthResult<(Principal, bool)> {
    let email = normalize_email(&seed.email);
    match directory.find_user_by_email(&email).await? {
        Some(user) => {
            let principal = directory.assign_role(user.id, ADMIN_ROLE).await?;
            Ok((principal, false))
        }
        None => {
            let principal = directory
                .create_user(NewUser {
                    email,
                    password: seed.password,
                    first_name: seed.first_name,
                    last_name: seed.last_name,
                    phone: None,
                    avatar_url: None,
                    active: true,
                    roles: vec![ADMIN_ROLE.to_string()],
                })
                .await?;
            info!(user_id = principal.id(), "created administrator");
            Ok((principal, true))
        }
    }
}
