//! Authentication and authorization logic.
//!
//! Password hashing, token issuance and validation, the authorization graph,
//! and the login/refresh/validate flows built from them.

pub mod authenticator;
pub mod directory;
pub mod graph;
pub mod guard;
pub mod jwt;
pub mod password;
pub mod service;
pub mod throttle;

use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong email/password pair or inactive account. Deliberately uniform.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed, wrongly signed, expired, or wrong-kind token, or a subject
    /// that no longer resolves to an active user.
    #[error("Invalid or expired token")]
    TokenInvalid,

    #[error("Fatal configuration error: {0}")]
    ConfigurationFatal(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Missing permission: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("System role '{0}' cannot be deleted or renamed")]
    SystemRole(String),

    #[error("Too many failed login attempts, retry in {retry_after_secs}s")]
    TooManyAttempts { retry_after_secs: u64 },

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience alias for core auth results.
pub type AuthResult<T> = Result<T, AuthError>;
