//! Credential verification: `(email, password)` → [`Principal`] or rejection.
//!
//! Every rejection reaches the caller as `AuthError::InvalidCredentials`.
//! The concrete reason is only logged.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::throttle::LoginThrottle;
use super::{AuthError, AuthResult, graph, password};
use crate::config::generate_secret;
use crate::models::auth::{Principal, StoredUser, normalize_email};
use crate::store::CredentialStore;

/// Why an authentication attempt failed. Never leaves this module except in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    UnknownEmail,
    BadSecret,
    Inactive,
}

impl Rejection {
    fn as_str(self) -> &'static str {
        match self {
            Rejection::UnknownEmail => "unknown_email",
            Rejection::BadSecret => "bad_secret",
            Rejection::Inactive => "inactive",
        }
    }
}

/// Validates plaintext credentials against the credential store.
pub struct Authenticator {
    store: Arc<dyn CredentialStore>,
    throttle: Arc<LoginThrottle>,
    /// Verified against when the email is unknown, so both paths pay one bcrypt.
    dummy_hash: String,
}

impl Authenticator {
    /// Build an authenticator. Computes one bcrypt hash at `bcrypt_cost`.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        throttle: Arc<LoginThrottle>,
        bcrypt_cost: u32,
    ) -> AuthResult<Self> {
        let dummy_hash = password::hash_password(&generate_secret(), bcrypt_cost)?;
        Ok(Self {
            store,
            throttle,
            dummy_hash,
        })
    }

    /// Authenticate, returning the principal with roles and permissions resolved.
    pub async fn authenticate(&self, email: &str, plaintext: &str) -> AuthResult<Principal> {
        if email.trim().is_empty() || plaintext.is_empty() {
            return Err(AuthError::Validation(
                "email and password are required".into(),
            ));
        }
        let email = normalize_email(email);
        // Released on drop if the lookup or hashing below errors out.
        let slot = self.throttle.begin(&email, Utc::now())?;

        match self.verify(&email, plaintext).await? {
            Ok(stored) => {
                slot.succeed();
                info!(user_id = stored.user.id, "authenticated");
                graph::resolve(self.store.as_ref(), stored).await
            }
            Err(reason) => {
                let failures = slot.fail(Utc::now());
                warn!(
                    email = %email,
                    reason = reason.as_str(),
                    failures,
                    "authentication rejected"
                );
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    async fn verify(
        &self,
        email: &str,
        plaintext: &str,
    ) -> AuthResult<Result<StoredUser, Rejection>> {
        let Some(stored) = self.store.find_user_by_email(email).await? else {
            password::verify_password_blocking(plaintext.to_string(), self.dummy_hash.clone())
                .await?;
            return Ok(Err(Rejection::UnknownEmail));
        };
        let matches =
            password::verify_password_blocking(plaintext.to_string(), stored.password_hash.clone())
                .await?;
        Ok(if !matches {
            Err(Rejection::BadSecret)
        } else if !stored.user.active {
            Err(Rejection::Inactive)
        } else {
            Ok(stored)
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::store::{MemoryStore, NewUserRecord, UserChanges};

    const COST: u32 = 4;

    async fn setup(max_attempts: u32) -> (Arc<MemoryStore>, Authenticator) {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_user(NewUserRecord {
                email: "alice@x.com".into(),
                password_hash: password::hash_password("secret123", COST).unwrap(),
                first_name: "Alice".into(),
                last_name: "Doe".into(),
                phone: None,
                avatar_url: None,
                active: true,
            })
            .await
            .unwrap();
        let throttle = Arc::new(LoginThrottle::new(max_attempts, Duration::minutes(15)));
        let auth = Authenticator::new(store.clone(), throttle, COST).unwrap();
        (store, auth)
    }

    #[tokio::test]
    async fn correct_secret_authenticates() {
        let (_, auth) = setup(5).await;
        let principal = auth.authenticate("alice@x.com", "secret123").await.unwrap();
        assert_eq!(principal.user.email, "alice@x.com");
    }

    #[tokio::test]
    async fn email_lookup_ignores_case() {
        let (_, auth) = setup(5).await;
        assert!(auth.authenticate(" Alice@X.COM", "secret123").await.is_ok());
    }

    #[tokio::test]
    async fn wrong_secret_and_unknown_email_look_identical() {
        let (_, auth) = setup(5).await;
        let wrong = auth.authenticate("alice@x.com", "secret124").await.unwrap_err();
        let unknown = auth.authenticate("bob@x.com", "secret123").await.unwrap_err();
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn inactive_account_is_rejected_even_with_correct_secret() {
        let (store, auth) = setup(5).await;
        store
            .update_user(
                1,
                UserChanges {
                    active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(matches!(
            auth.authenticate("alice@x.com", "secret123").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn empty_inputs_are_rejected() {
        let (_, auth) = setup(5).await;
        assert!(matches!(
            auth.authenticate("", "secret123").await,
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            auth.authenticate("alice@x.com", "").await,
            Err(AuthError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn lockout_after_repeated_failures() {
        let (_, auth) = setup(3).await;
        for _ in 0..3 {
            assert!(matches!(
                auth.authenticate("alice@x.com", "nope").await,
                Err(AuthError::InvalidCredentials)
            ));
        }
        assert!(matches!(
            auth.authenticate("alice@x.com", "secret123").await,
            Err(AuthError::TooManyAttempts { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_guesses_cannot_exceed_the_limit() {
        let (_, auth) = setup(3).await;
        let auth = Arc::new(auth);
        let tasks: Vec<_> = (0..40)
            .map(|i| {
                let auth = auth.clone();
                tokio::spawn(async move {
                    auth.authenticate("alice@x.com", &format!("guess{i}")).await
                })
            })
            .collect();

        let mut verified = 0;
        let mut refused = 0;
        for task in tasks {
            match task.await.unwrap() {
                Err(AuthError::InvalidCredentials) => verified += 1,
                Err(AuthError::TooManyAttempts { .. }) => refused += 1,
                other => panic!("unexpected: {other:?}"),
            }
        }
        assert!(verified <= 3, "{verified} guesses reached bcrypt");
        assert_eq!(verified + refused, 40);
        assert!(matches!(
            auth.authenticate("alice@x.com", "secret123").await,
            Err(AuthError::TooManyAttempts { .. })
        ));
    }

    #[tokio::test]
    async fn success_resets_failure_count() {
        let (_, auth) = setup(2).await;
        let _ = auth.authenticate("alice@x.com", "nope").await;
        auth.authenticate("alice@x.com", "secret123").await.unwrap();
        let _ = auth.authenticate("alice@x.com", "nope").await;
        assert!(auth.authenticate("alice@x.com", "secret123").await.is_ok());
    }
}
