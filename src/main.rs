//! keepsake-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use keepsake_gateway::api;
use keepsake_gateway::app_state::AppState;
use keepsake_gateway::config::GatewayConfig;
use keepsake_gateway::store::{DocumentStore, MemoryStore, PostgresStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = GatewayConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, "starting keepsake-gateway");

    // Build store
    let store: Arc<dyn DocumentStore> = match &config.database_url {
        Some(url) => Arc::new(
            PostgresStore::connect(
                url,
                config.database_max_connections,
                Duration::from_secs(config.database_connect_timeout_secs),
                config.event_bus_capacity,
            )
            .await?,
        ),
        None => {
            tracing::warn!("DATABASE_URL not set, pages live in memory only");
            Arc::new(MemoryStore::new(config.event_bus_capacity))
        }
    };

    // Build application state and router
    let app_state = AppState::new(&config, store)?;
    let sync = app_state.page_service.sync().clone();
    let app = api::build_app(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    // Drain queued writes before exiting
    sync.shutdown().await;

    Ok(())
}
