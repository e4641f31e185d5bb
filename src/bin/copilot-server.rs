//! Copilot server - HTTP front end for the copilot service
//!
//! Reads configuration from the environment, initializes the application
//! context (activating in-memory/stub fallbacks for unreachable
//! dependencies), and serves the REST API.
//!
//! Usage:
//!   copilot-server
//!
//! Configuration comes from environment variables; see `Settings::from_env`.

use desk_copilot::api::router;
use desk_copilot::{AppContext, Settings};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env()?;
    let bind_addr = settings.server.bind_addr.clone();

    let context = Arc::new(AppContext::initialize(settings).await?);
    let app = router(context.clone());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "copilot server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    context.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
