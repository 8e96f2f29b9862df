//! Command-line behaviour of the `warden` binary.

use assert_cmd::Command;
use predicates::prelude::*;

fn warden() -> Command {
    let mut cmd = Command::cargo_bin("warden").unwrap();
    for key in [
        "WARDEN_ENV",
        "JWT_SECRET",
        "AUTH_SECRET",
        "JWT_EXPIRES_IN",
        "REFRESH_TOKEN_EXPIRES_IN",
        "BCRYPT_ROUNDS",
        "MAX_LOGIN_ATTEMPTS",
        "LOCKOUT_DURATION",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

#[test]
fn version_prints_package_version() {
    warden()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn generate_secret_prints_64_alphanumerics() {
    let out = warden().arg("generate-secret").output().unwrap();
    assert!(out.status.success());
    let secret = String::from_utf8(out.stdout).unwrap();
    let secret = secret.trim();
    assert_eq!(secret.len(), 64);
    assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));
}

#[test]
fn hash_password_emits_bcrypt_hash() {
    warden()
        .args(["hash-password", "--password", "pw12345", "--cost", "4"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("$2"));
}

#[test]
fn hash_password_reads_stdin() {
    warden()
        .args(["hash-password", "--cost", "4"])
        .write_stdin("from-stdin\n")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("$2"));
}

#[test]
fn check_config_fails_closed_in_production_without_secret() {
    warden()
        .arg("check-config")
        .env("WARDEN_ENV", "production")
        .assert()
        .failure()
        .stderr(predicate::str::contains("JWT_SECRET is required in production"));
}

#[test]
fn check_config_rejects_short_production_secret() {
    warden()
        .arg("check-config")
        .env("WARDEN_ENV", "production")
        .env("JWT_SECRET", "too-short")
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least 32 bytes"));
}

#[test]
fn check_config_reports_production_settings() {
    warden()
        .arg("check-config")
        .env("WARDEN_ENV", "production")
        .env("JWT_SECRET", "p".repeat(48))
        .env("JWT_EXPIRES_IN", "15m")
        .assert()
        .success()
        .stdout(predicate::str::contains("Production"))
        .stdout(predicate::str::contains("48 bytes"))
        .stdout(predicate::str::contains("900s"));
}

#[test]
fn bootstrap_requires_admin_email_and_password_together() {
    warden()
        .args(["bootstrap", "--admin-email", "root@isp.example"])
        .env_remove("WARDEN_ADMIN_PASSWORD")
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be given together"));
}
