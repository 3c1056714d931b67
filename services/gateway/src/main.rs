use anyhow::Result;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

mod auth;
mod config;
mod error;
mod middleware;
mod models;
mod relay;
mod repositories;
mod routes;
mod state;
mod telegram;
mod turnstile;
mod views;

use common::database::{DatabaseConfig, health_check, init_pool, migrate};
use tokio::net::TcpListener;

use crate::config::GatewayConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_max_level(Level::INFO)
        .init();

    info!("Starting relay gateway");

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }
    migrate(&pool).await?;

    let config = GatewayConfig::from_env();
    let bind_addr = config.bind_addr.clone();
    let app = routes::build_app(config, pool);

    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Relay gateway listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
