//! Authorization graph: User → Roles → Permissions.
//!
//! Pure reads over already-loaded associations. Absent relations yield empty
//! sets, never errors. Resolution from the store lives in [`resolve`].

use std::collections::BTreeSet;

use super::AuthResult;
use crate::models::auth::{Principal, Role, StoredUser};
use crate::store::CredentialStore;

/// Names of the roles held by `principal`.
pub fn roles_of(principal: &Principal) -> BTreeSet<String> {
    principal.roles.iter().map(|r| r.name.clone()).collect()
}

/// Union of the permission names of every role held by `principal`.
pub fn permissions_of(principal: &Principal) -> BTreeSet<String> {
    principal
        .roles
        .iter()
        .flat_map(|r| r.permissions.iter().map(|p| p.name.clone()))
        .collect()
}

/// Permission names carried by a single role.
pub fn role_permissions(role: &Role) -> BTreeSet<String> {
    role.permissions.iter().map(|p| p.name.clone()).collect()
}

pub fn role_has_permission(role: &Role, name: &str) -> bool {
    role.permissions.iter().any(|p| p.name == name)
}

pub fn role_has_any_permission(role: &Role, names: &[&str]) -> bool {
    role.permissions.iter().any(|p| names.contains(&p.name.as_str()))
}

impl Principal {
    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r.name == name)
    }

    pub fn has_any_role(&self, names: &[&str]) -> bool {
        self.roles.iter().any(|r| names.contains(&r.name.as_str()))
    }

    pub fn has_permission(&self, name: &str) -> bool {
        self.roles.iter().any(|r| role_has_permission(r, name))
    }

    pub fn has_any_permission(&self, names: &[&str]) -> bool {
        self.roles.iter().any(|r| role_has_any_permission(r, names))
    }
}

/// Load the roles (with permissions) of a stored user and build a [`Principal`].
pub async fn resolve(store: &dyn CredentialStore, stored: StoredUser) -> AuthResult<Principal> {
    let roles = store.user_roles(stored.user.id).await?;
    Ok(Principal {
        user: stored.user,
        roles,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::auth::{Permission, User};

    fn perm(id: i64, name: &str) -> Permission {
        let (resource, action) = name.split_once(':').unwrap();
        Permission {
            id,
            name: name.to_string(),
            resource: resource.to_string(),
            action: action.to_string(),
            description: None,
            created_at: Utc::now(),
        }
    }

    fn role(id: i64, name: &str, perms: Vec<Permission>) -> Role {
        Role {
            id,
            name: name.to_string(),
            display_name: name.to_uppercase(),
            description: None,
            is_system: false,
            permissions: perms,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn principal(roles: Vec<Role>) -> Principal {
        let now = Utc::now();
        Principal {
            user: User {
                id: 1,
                email: "p@x.com".into(),
                first_name: "P".into(),
                last_name: "Q".into(),
                phone: None,
                avatar_url: None,
                active: true,
                email_verified_at: None,
                last_login_at: None,
                created_at: now,
                updated_at: now,
            },
            roles,
        }
    }

    #[test]
    fn no_roles_yields_empty_sets() {
        let p = principal(vec![]);
        assert!(roles_of(&p).is_empty());
        assert!(permissions_of(&p).is_empty());
        assert!(!p.has_permission("customers:read"));
    }

    #[test]
    fn shared_permission_appears_once() {
        let read = perm(1, "customers:read");
        let p = principal(vec![
            role(1, "admin", vec![read.clone(), perm(2, "customers:write")]),
            role(2, "support", vec![read, perm(3, "tickets:write")]),
        ]);
        let perms: Vec<String> = permissions_of(&p).into_iter().collect();
        assert_eq!(
            perms,
            vec!["customers:read", "customers:write", "tickets:write"]
        );
    }

    #[test]
    fn permissions_equal_union_of_role_permissions() {
        let roles = vec![
            role(1, "a", vec![perm(1, "x:read"), perm(2, "y:read")]),
            role(2, "b", vec![perm(2, "y:read"), perm(3, "z:read")]),
        ];
        let expected: BTreeSet<String> = roles.iter().flat_map(role_permissions).collect();
        assert_eq!(permissions_of(&principal(roles)), expected);
    }

    #[test]
    fn role_membership_helpers() {
        let r = role(1, "billing", vec![perm(1, "billing:read")]);
        assert!(role_has_permission(&r, "billing:read"));
        assert!(!role_has_permission(&r, "billing:write"));
        assert!(role_has_any_permission(&r, &["billing:write", "billing:read"]));
        assert!(!role_has_any_permission(&r, &[]));
    }

    #[test]
    fn principal_role_and_permission_checks() {
        let p = principal(vec![role(1, "support", vec![perm(1, "tickets:write")])]);
        assert!(p.has_role("support"));
        assert!(!p.has_role("admin"));
        assert!(p.has_any_role(&["admin", "support"]));
        assert!(p.has_permission("tickets:write"));
        assert!(p.has_any_permission(&["nas:read", "tickets:write"]));
        assert!(!p.has_any_permission(&["nas:read"]));
    }

    #[test]
    fn view_carries_sorted_names() {
        let p = principal(vec![
            role(2, "support", vec![perm(2, "tickets:write")]),
            role(1, "admin", vec![perm(1, "customers:read")]),
        ]);
        let view = p.view();
        assert_eq!(view.roles, vec!["admin", "support"]);
        assert_eq!(view.permissions, vec!["customers:read", "tickets:write"]);
        assert_eq!(view.full_name, "P Q");
    }
}
