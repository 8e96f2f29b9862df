use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{}", .0)]
    Custom(String),

    #[error("IO::{:?}: {}", .0, .0)]
    Io(#[from] std::io::Error),

    #[error("FlexiLogger::{:?}: {}", .0, .0)]
    FlexiLogger(#[from] flexi_logger::FlexiLoggerError),

    #[error("{}", .0)]
    Auth(#[from] warden_core::auth::AuthError),

    #[error("Database::{}", .0)]
    Database(#[from] sqlx::Error),

    #[error("Migrate::{}", .0)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}
