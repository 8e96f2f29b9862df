// Import and re-export the `error` module
pub use self::error::{Error, Result};
mod error;

use std::io::BufRead;
use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Commands};
use sqlx::postgres::PgPoolOptions;
use warden_core::auth::directory::Directory;
use warden_core::auth::password;
use warden_core::bootstrap::{AdminSeed, bootstrap};
use warden_core::config::{AuthConfig, generate_secret};
use warden_core::store::PgStore;

mod cli;
mod logging;

fn main() -> Result<()> {
    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init()?;

    let args = Cli::parse();

    match args.command {
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), warden_core::version());
        }
        Commands::HashPassword { password, cost } => {
            let plaintext = match password {
                Some(p) => p,
                None => read_line_from_stdin()?,
            };
            if plaintext.is_empty() {
                return Err(Error::Custom("password must not be empty".into()));
            }
            println!("{}", password::hash_password(&plaintext, cost)?);
        }
        Commands::GenerateSecret => {
            println!("{}", generate_secret());
        }
        Commands::CheckConfig => {
            let config = AuthConfig::from_env()?;
            println!("environment:        {:?}", config.environment);
            println!("jwt secret:         {} bytes", config.jwt_secret.len());
            println!("access token ttl:   {}s", config.access_ttl.num_seconds());
            println!("refresh token ttl:  {}s", config.refresh_ttl.num_seconds());
            println!("bcrypt cost:        {}", config.bcrypt_cost);
            println!("max login attempts: {}", config.max_login_attempts);
            println!("lockout duration:   {}s", config.lockout_duration.num_seconds());
        }
        Commands::Bootstrap {
            database_url,
            admin_email,
            admin_password,
            admin_first_name,
            admin_last_name,
        } => {
            let admin = match (admin_email, admin_password) {
                (Some(email), Some(password)) => Some(AdminSeed {
                    email,
                    password,
                    first_name: admin_first_name,
                    last_name: admin_last_name,
                }),
                (None, None) => None,
                _ => {
                    return Err(Error::Custom(
                        "--admin-email and --admin-password must be given together".into(),
                    ));
                }
            };
            run_bootstrap(&database_url, admin)?;
        }
    }

    Ok(())
}

fn read_line_from_stdin() -> Result<String> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn run_bootstrap(database_url: &str, admin: Option<AdminSeed>) -> Result<()> {
    let config = AuthConfig::from_env()?;
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(database_url)
            .await?;
        log::info!("running database migrations");
        warden_core::migrate::migrate(&pool).await?;

        let directory = Directory::new(Arc::new(PgStore::new(pool)), config.bcrypt_cost);
        let report = bootstrap(&directory, admin).await?;
        log::info!(
            "seeded {} system roles, {} new permissions, admin created: {}",
            report.roles,
            report.permissions,
            report.admin_created
        );
        Ok::<(), Error>(())
    })
}
