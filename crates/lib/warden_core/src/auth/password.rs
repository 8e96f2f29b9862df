//! Password hashing via bcrypt.
//!
//! bcrypt is CPU-bound; the async variants move the work onto the blocking
//! pool so concurrent logins do not stall the request executor.

use super::{AuthError, AuthResult};

/// Default bcrypt cost factor.
pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// Hash a password with bcrypt at the given cost.
pub fn hash_password(password: &str, cost: u32) -> AuthResult<String> {
    bcrypt::hash(password, cost).map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))
}

/// Verify a password against a bcrypt hash.
pub fn verify_password(password: &str, hash: &str) -> AuthResult<bool> {
    bcrypt::verify(password, hash).map_err(|e| AuthError::Internal(format!("bcrypt verify: {e}")))
}

/// [`hash_password`] on the blocking thread pool.
pub async fn hash_password_blocking(password: String, cost: u32) -> AuthResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(|e| AuthError::Internal(format!("hash task: {e}")))?
}

/// [`verify_password`] on the blocking thread pool.
pub async fn verify_password_blocking(password: String, hash: String) -> AuthResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AuthError::Internal(format!("verify task: {e}")))?
}
