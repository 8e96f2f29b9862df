//! Authentication configuration.
//!
//! Values are read through a key lookup so the same parsing runs against the
//! process environment in production and against fixed maps in tests.
//!
//! | Variable                   | Default                               |
//! |----------------------------|---------------------------------------|
//! | `WARDEN_ENV`               | `development`                         |
//! | `JWT_SECRET` / `AUTH_SECRET` | required in production; generated & persisted otherwise |
//! | `JWT_EXPIRES_IN`           | `24h`                                 |
//! | `REFRESH_TOKEN_EXPIRES_IN` | `7d`                                  |
//! | `BCRYPT_ROUNDS`            | `12`                                  |
//! | `MAX_LOGIN_ATTEMPTS`       | `5` (`0` disables throttling)         |
//! | `LOCKOUT_DURATION`         | `900` (seconds, suffixes allowed)     |

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::Duration;
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::{info, warn};

use crate::auth::password::DEFAULT_BCRYPT_COST;
use crate::auth::{AuthError, AuthResult};

/// Minimum signing secret length (bytes) accepted in production.
pub const MIN_SECRET_LEN: usize = 32;

/// Length of generated development secrets.
const GENERATED_SECRET_LEN: usize = 64;

/// Longest accepted token lifetime or lockout window.
pub const MAX_DURATION_DAYS: i64 = 3650;

/// Deployment posture. Production fails closed on weak configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl Environment {
    fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("production" | "prod") => Self::Production,
            Some("test") => Self::Test,
            _ => Self::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

/// Symmetric HS256 secret. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningSecret(String);

impl SigningSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningSecret(<{} bytes>)", self.0.len())
    }
}

/// Configuration consumed by the auth core.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub environment: Environment,
    pub jwt_secret: SigningSecret,
    /// Access token lifetime.
    pub access_ttl: Duration,
    /// Refresh token lifetime.
    pub refresh_ttl: Duration,
    pub bcrypt_cost: u32,
    /// Failed attempts tolerated per window. `0` disables throttling.
    pub max_login_attempts: u32,
    /// Window over which failures are counted, and how long a lockout lasts.
    pub lockout_duration: Duration,
}

impl AuthConfig {
    /// Defaults with an explicit secret, development posture.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            environment: Environment::Development,
            jwt_secret: SigningSecret::new(secret),
            access_ttl: Duration::hours(24),
            refresh_ttl: Duration::days(7),
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            max_login_attempts: 5,
            lockout_duration: Duration::seconds(900),
        }
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> AuthResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, persisting generated development
    /// secrets to the platform data directory.
    pub fn from_lookup<F>(lookup: F) -> AuthResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_lookup_with_secret_path(lookup, &jwt_secret_path())
    }

    /// Like [`AuthConfig::from_lookup`] with an explicit path for the
    /// generated development secret.
    pub fn from_lookup_with_secret_path<F>(lookup: F, secret_path: &Path) -> AuthResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = Environment::parse(get("WARDEN_ENV").as_deref());
        let jwt_secret = resolve_jwt_secret(
            environment,
            get("JWT_SECRET").or_else(|| get("AUTH_SECRET")),
            secret_path,
        )?;

        let access_ttl = duration_setting(get("JWT_EXPIRES_IN"), "JWT_EXPIRES_IN", Duration::hours(24))?;
        let refresh_ttl = duration_setting(
            get("REFRESH_TOKEN_EXPIRES_IN"),
            "REFRESH_TOKEN_EXPIRES_IN",
            Duration::days(7),
        )?;
        if refresh_ttl <= access_ttl {
            warn!(
                access_secs = access_ttl.num_seconds(),
                refresh_secs = refresh_ttl.num_seconds(),
                "refresh token lifetime does not exceed access token lifetime"
            );
        }

        let bcrypt_cost = u32_setting(get("BCRYPT_ROUNDS"), "BCRYPT_ROUNDS", DEFAULT_BCRYPT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(AuthError::ConfigurationFatal(format!(
                "BCRYPT_ROUNDS must be between 4 and 31, got {bcrypt_cost}"
            )));
        }

        let max_login_attempts = u32_setting(get("MAX_LOGIN_ATTEMPTS"), "MAX_LOGIN_ATTEMPTS", 5)?;
        let lockout_duration = duration_setting(
            get("LOCKOUT_DURATION"),
            "LOCKOUT_DURATION",
            Duration::seconds(900),
        )?;

        Ok(Self {
            environment,
            jwt_secret,
            access_ttl,
            refresh_ttl,
            bcrypt_cost,
            max_login_attempts,
            lockout_duration,
        })
    }
}

/// Resolve the signing secret.
///
/// Production: the secret must be supplied and at least [`MIN_SECRET_LEN`]
/// bytes, otherwise startup aborts. Elsewhere a missing secret is read from
/// (or generated into) `secret_path`.
fn resolve_jwt_secret(
    environment: Environment,
    supplied: Option<String>,
    secret_path: &Path,
) -> AuthResult<SigningSecret> {
    match supplied {
        Some(secret) if secret.len() >= MIN_SECRET_LEN => Ok(SigningSecret::new(secret)),
        Some(secret) if environment.is_production() => Err(AuthError::ConfigurationFatal(format!(
            "JWT_SECRET must be at least {MIN_SECRET_LEN} bytes in production (got {})",
            secret.len()
        ))),
        Some(secret) => {
            warn!(
                len = secret.len(),
                min = MIN_SECRET_LEN,
                "JWT secret is shorter than the production minimum"
            );
            Ok(SigningSecret::new(secret))
        }
        None if environment.is_production() => Err(AuthError::ConfigurationFatal(
            "JWT_SECRET is required in production".into(),
        )),
        None => load_or_generate_secret(secret_path),
    }
}

fn load_or_generate_secret(secret_path: &Path) -> AuthResult<SigningSecret> {
    if let Ok(existing) = std::fs::read_to_string(secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return Ok(SigningSecret::new(trimmed));
        }
    }
    let secret = generate_secret();
    if let Some(parent) = secret_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            AuthError::ConfigurationFatal(format!("create {}: {e}", parent.display()))
        })?;
    }
    std::fs::write(secret_path, &secret).map_err(|e| {
        AuthError::ConfigurationFatal(format!("write {}: {e}", secret_path.display()))
    })?;
    info!(path = %secret_path.display(), "generated new JWT secret");
    Ok(SigningSecret::new(secret))
}

/// Generate a random alphanumeric secret suitable for `JWT_SECRET`.
pub fn generate_secret() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_SECRET_LEN)
        .map(char::from)
        .collect()
}

/// Path to the persisted development JWT secret.
pub fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("warden")
        .join("jwt-secret")
}

/// Parse `<n>[s|m|h|d]`; a bare number is seconds.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let (digits, unit) = match value.char_indices().last()? {
        (i, c) if c.is_ascii_alphabetic() => (&value[..i], c.to_ascii_lowercase()),
        _ => (value, 's'),
    };
    let n: i64 = digits.trim().parse().ok()?;
    if n < 0 {
        return None;
    }
    match unit {
        's' => Duration::try_seconds(n),
        'm' => Duration::try_minutes(n),
        'h' => Duration::try_hours(n),
        'd' => Duration::try_days(n),
        _ => None,
    }
}

fn duration_setting(value: Option<String>, name: &str, default: Duration) -> AuthResult<Duration> {
    let Some(v) = value else {
        return Ok(default);
    };
    let duration = parse_duration(&v).ok_or_else(|| {
        AuthError::ConfigurationFatal(format!("{name}: invalid duration '{v}'"))
    })?;
    if duration > Duration::days(MAX_DURATION_DAYS) {
        return Err(AuthError::ConfigurationFatal(format!(
            "{name}: '{v}' exceeds the {MAX_DURATION_DAYS} day maximum"
        )));
    }
    Ok(duration)
}

fn u32_setting(value: Option<String>, name: &str, default: u32) -> AuthResult<u32> {
    match value {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|e| AuthError::ConfigurationFatal(format!("{name}: {e}"))),
    }
}
