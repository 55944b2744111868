//! Mapress HTTP server
//!
//! Serves the streaming outline pipeline and the topic-map endpoint.
//! Configuration comes from the environment (see `MapressConfig::from_env`);
//! `MAPRESS_BIND` sets the listen address.

mod routes;

use std::sync::Arc;

use anyhow::{Context, Result};
use mapress_core::MapressConfig;
use mapress_core::orchestrator::Adapters;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::routes::{AppState, router};

const DEFAULT_BIND: &str = "0.0.0.0:3000";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,mapress_core=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Mapress server v{}", env!("CARGO_PKG_VERSION"));

    let config = MapressConfig::from_env().context("Failed to load configuration")?;
    if config.search_url.is_none() {
        tracing::warn!("MCP_SEARCH_URL is not set; live searches will return no sources");
    }
    let adapters = Adapters::live(&config).context("Failed to build service adapters")?;

    let state = AppState {
        config: Arc::new(config),
        adapters,
    };
    let app = router(state);

    let bind = std::env::var("MAPRESS_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    info!("Listening on {}", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
