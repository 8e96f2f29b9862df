//! Route paths.

pub const POST_AUTH_LOGIN: &str = "/auth/login";
pub const POST_AUTH_REFRESH: &str = "/auth/refresh";
pub const POST_AUTH_LOGOUT: &str = "/auth/logout";
pub const GET_AUTH_ME: &str = "/auth/me";

pub const USERS: &str = "/users";
pub const USERS_ID: &str = "/users/{id}";
pub const POST_USERS_ID_DEACTIVATE: &str = "/users/{id}/deactivate";
pub const POST_USERS_ID_ACTIVATE: &str = "/users/{id}/activate";
pub const USERS_ID_ROLES_ROLE: &str = "/users/{id}/roles/{role}";

pub const ROLES: &str = "/roles";
pub const ROLES_NAME: &str = "/roles/{name}";
pub const ROLES_NAME_PERMISSIONS_PERMISSION: &str = "/roles/{name}/permissions/{permission}";

pub const PERMISSIONS: &str = "/permissions";
