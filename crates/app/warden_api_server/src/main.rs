//! Warden API server binary.
//!
//! Refuses to start when the auth configuration is unsafe for the selected
//! environment (e.g. no signing secret in production).

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};
use warden_core::config::AuthConfig;
use warden_core::store::PgStore;

/// How often lapsed login-throttle windows are dropped.
const THROTTLE_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "warden_api_server", about = "Warden identity and access API")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3100")]
    bind_addr: String,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/warden"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 10)]
    max_connections: u32,

    /// Skip running embedded migrations at startup.
    #[arg(long, default_value_t = false)]
    skip_migrations: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,warden_api=debug,warden_core=debug".into()),
        )
        .init();

    let args = Args::parse();

    let auth_config = match AuthConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "refusing to start");
            return Err(e.into());
        }
    };
    info!(
        environment = ?auth_config.environment,
        access_ttl_secs = auth_config.access_ttl.num_seconds(),
        refresh_ttl_secs = auth_config.refresh_ttl.num_seconds(),
        "auth configuration loaded"
    );

    info!(max_connections = args.max_connections, "configuring connection pool");
    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&args.database_url)
        .await?;

    if !args.skip_migrations {
        info!("running database migrations");
        warden_api::migrate(&pool).await?;
    }

    let store = Arc::new(PgStore::new(pool));
    let state = warden_api::AppState::new(store, &auth_config)?;

    tokio::spawn({
        let auth = state.auth.clone();
        async move {
            let mut ticker = tokio::time::interval(THROTTLE_PRUNE_INTERVAL);
            loop {
                ticker.tick().await;
                auth.prune_throttle();
            }
        }
    });

    let app = warden_api::router(state);

    let listener = tokio::net::TcpListener::bind(&args.bind_addr).await?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
