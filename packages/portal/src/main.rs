use std::net::SocketAddr;

use anyhow::Context;
use portal::config::AppConfig;
use portal::state::AppState;
use portal::{build_router, database, notification, seed, session};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;
    if config.auth.jwt_secret.len() < 32 {
        warn!("auth.jwt_secret is shorter than 32 bytes");
    }

    let db = database::init_db(&config.database)
        .await
        .context("Failed to connect to the database")?;
    seed::seed_bootstrap_admin(&db, &config.auth)
        .await
        .context("Failed to seed the bootstrap admin")?;

    let notifier = notification::from_config(
        &config.notification,
        common::RetryPolicy::from(&config.retry),
    )?;

    if config.sweeper.enabled {
        tokio::spawn(session::run_sweeper(
            db.clone(),
            config.session.clone(),
            config.sweeper.clone(),
        ));
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server.host/server.port")?;

    let app = build_router(AppState::new(db, config, notifier));

    info!("Server running at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutting down");
}
