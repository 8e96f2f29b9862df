//! JWT token generation and verification.
//!
//! One HS256 secret signs both token kinds. The `typ` claim keeps a refresh
//! token from being accepted where an access token is expected, and the
//! reverse.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{AuthError, AuthResult, graph};
use crate::config::{AuthConfig, SigningSecret};
use crate::models::auth::{AccessClaims, Principal, RefreshClaims, TokenKind, UserId};

/// Mints and verifies access and refresh tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &SigningSecret, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.jwt_secret, config.access_ttl, config.refresh_ttl)
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Sign an access token snapshotting the principal's roles and permissions.
    pub fn issue_access(
        &self,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> AuthResult<(String, AccessClaims)> {
        let claims = AccessClaims {
            sub: principal.id().to_string(),
            email: principal.user.email.clone(),
            roles: graph::roles_of(principal).into_iter().collect(),
            permissions: graph::permissions_of(principal).into_iter().collect(),
            typ: TokenKind::Access,
            exp: expiry(now, self.access_ttl)?,
            iat: now.timestamp(),
        };
        let token = self.sign(&claims)?;
        Ok((token, claims))
    }

    /// Sign a refresh token for `user_id`.
    pub fn issue_refresh(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AuthResult<(String, RefreshClaims)> {
        let claims = RefreshClaims {
            sub: user_id.to_string(),
            typ: TokenKind::Refresh,
            exp: expiry(now, self.refresh_ttl)?,
            iat: now.timestamp(),
        };
        let token = self.sign(&claims)?;
        Ok((token, claims))
    }

    /// Verify an access token, returning its claims.
    pub fn decode_access(&self, token: &str) -> AuthResult<AccessClaims> {
        let claims: AccessClaims = self.verify(token)?;
        if claims.typ != TokenKind::Access {
            debug!(typ = ?claims.typ, "rejected token: not an access token");
            return Err(AuthError::TokenInvalid);
        }
        Ok(claims)
    }

    /// Verify a refresh token, returning its claims.
    pub fn decode_refresh(&self, token: &str) -> AuthResult<RefreshClaims> {
        let claims: RefreshClaims = self.verify(token)?;
        if claims.typ != TokenKind::Refresh {
            debug!(typ = ?claims.typ, "rejected token: not a refresh token");
            return Err(AuthError::TokenInvalid);
        }
        Ok(claims)
    }

    fn sign<T: Serialize>(&self, claims: &T) -> AuthResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
    }

    fn verify<T: DeserializeOwned>(&self, token: &str) -> AuthResult<T> {
        decode::<T>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "rejected token");
                AuthError::TokenInvalid
            })
    }
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> AuthResult<i64> {
    now.checked_add_signed(ttl)
        .map(|at| at.timestamp())
        .ok_or_else(|| AuthError::Internal(format!("token expiry overflows: ttl {ttl}")))
}

/// Parse the numeric subject of a token.
pub fn subject_id(sub: &str) -> AuthResult<UserId> {
    sub.parse().map_err(|_| AuthError::TokenInvalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::{Permission, Role, User};

    fn issuer(secret: &str) -> TokenIssuer {
        TokenIssuer::new(
            &SigningSecret::new(secret),
            Duration::hours(24),
            Duration::days(7),
        )
    }

    fn admin() -> Principal {
        let now = Utc::now();
        let perm = |id: i64, action: &str| Permission {
            id,
            name: format!("customers:{action}"),
            resource: "customers".into(),
            action: action.into(),
            description: None,
            created_at: now,
        };
        Principal {
            user: User {
                id: 42,
                email: "root@x.com".into(),
                first_name: "Root".into(),
                last_name: "Admin".into(),
                phone: None,
                avatar_url: None,
                active: true,
                email_verified_at: None,
                last_login_at: None,
                created_at: now,
                updated_at: now,
            },
            roles: vec![Role {
                id: 1,
                name: "admin".into(),
                display_name: "Administrator".into(),
                description: None,
                is_system: true,
                permissions: vec![perm(1, "write"), perm(2, "read"), perm(2, "read")],
                created_at: now,
                updated_at: now,
            }],
        }
    }

    #[test]
    fn access_claims_carry_deduplicated_permissions() {
        let iss = issuer("secret-a");
        let (token, _) = iss.issue_access(&admin(), Utc::now()).unwrap();
        let claims = iss.decode_access(&token).unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.email, "root@x.com");
        assert_eq!(claims.roles, vec!["admin"]);
        let mut perms = claims.permissions.clone();
        perms.sort();
        assert_eq!(perms, vec!["customers:read", "customers:write"]);
    }

    #[test]
    fn expiry_follows_configured_ttl() {
        let iss = issuer("secret-a");
        let now = Utc::now();
        let (_, access) = iss.issue_access(&admin(), now).unwrap();
        let (_, refresh) = iss.issue_refresh(42, now).unwrap();
        assert_eq!(access.exp - access.iat, 24 * 3600);
        assert_eq!(refresh.exp - refresh.iat, 7 * 24 * 3600);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let (token, _) = issuer("secret-a").issue_access(&admin(), Utc::now()).unwrap();
        assert!(matches!(
            issuer("secret-b").decode_access(&token),
            Err(AuthError::TokenInvalid)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let iss = issuer("secret-a");
        let (token, _) = iss
            .issue_access(&admin(), Utc::now() - Duration::days(2))
            .unwrap();
        assert!(matches!(iss.decode_access(&token), Err(AuthError::TokenInvalid)));
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let iss = issuer("secret-a");
        let (refresh, _) = iss.issue_refresh(42, Utc::now()).unwrap();
        assert!(matches!(iss.decode_access(&refresh), Err(AuthError::TokenInvalid)));
        assert_eq!(iss.decode_refresh(&refresh).unwrap().sub, "42");
    }

    #[test]
    fn access_token_is_not_a_refresh_token() {
        let iss = issuer("secret-a");
        let (access, _) = iss.issue_access(&admin(), Utc::now()).unwrap();
        assert!(matches!(iss.decode_refresh(&access), Err(AuthError::TokenInvalid)));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            issuer("secret-a").decode_access("not.a.jwt"),
            Err(AuthError::TokenInvalid)
        ));
    }

    #[test]
    fn unrepresentable_expiry_is_an_error() {
        let iss = TokenIssuer::new(
            &SigningSecret::new("secret-a"),
            Duration::days(100_000_000),
            Duration::days(100_000_000),
        );
        assert!(matches!(
            iss.issue_access(&admin(), Utc::now()),
            Err(AuthError::Internal(_))
        ));
        assert!(matches!(
            iss.issue_refresh(42, Utc::now()),
            Err(AuthError::Internal(_))
        ));
    }

    #[test]
    fn subject_must_be_numeric() {
        assert_eq!(subject_id("17").unwrap(), 17);
        assert!(matches!(subject_id("abc"), Err(AuthError::TokenInvalid)));
    }
}
