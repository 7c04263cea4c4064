// API Server Binary Entry Point
//
// Purpose: Start the Axum identification server over the plant catalog
// Usage: cargo run --features api --bin api_server

use plant_id_reconciler::{create_router, AppState, ServerConfig};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing (structured logging)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    // Default log level: info for our crate, warn for others
                    "plant_id_reconciler=info,tower_http=debug,axum=debug,warn".into()
                }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting API server...");

    // Configuration from environment variables
    let config = ServerConfig::from_env();

    tracing::info!("Configuration:");
    tracing::info!("  CATALOG_PATH: {}", config.catalog_path);
    tracing::info!("  MODEL_FIXTURES: {}", config.model_fixtures.as_deref().unwrap_or("(none)"));
    tracing::info!("  PORT: {}", config.port);
    tracing::info!("  Model timeout: {:?}", config.reconcile.model_timeout);
    tracing::info!("  Lookup timeout: {:?}", config.reconcile.lookup_timeout);

    // Initialize application state (loads catalog, builds index)
    tracing::info!("Initializing application state...");
    let state = AppState::new(&config).await?;
    tracing::info!("Application state initialized successfully");

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
