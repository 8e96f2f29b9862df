//! # warden_core
//!
//! Identity and access control: credential storage, the role/permission
//! graph, authentication, token issuance and session validation.

pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod migrate;
pub mod models;
pub mod store;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
