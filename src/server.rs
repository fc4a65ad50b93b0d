/// Server setup and initialization
///
/// Wires together the database, services, authorization gate and HTTP routes.
/// Provides the main application factory function for creating the Axum app.

use crate::{
    api::{create_router, AppState},
    config::Config,
    database,
};
use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Create the main Axum application with all routes and middleware
///
/// Opens the database (creating the schema if needed), builds the services
/// and mounts every route behind the authorization gate.
pub async fn create_app(config: Config) -> Result<Router> {
    tracing::info!("🏗️ Connecting to database");
    let pool = database::connect(&config.database.url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open database: {}", e))?;

    tracing::info!("🔐 Initializing authentication services");
    let state = AppState::new(pool, config.auth)?;

    tracing::info!("📡 Creating HTTP router with all endpoints");
    let app = create_router(state);

    tracing::info!("✅ Application initialized successfully");

    Ok(app)
}

/// Start the HTTP server with the given configuration
///
/// Validates the configuration, creates the application and serves it on the
/// configured address and port.
pub async fn start_server(config: Config) -> Result<()> {
    // Initialize tracing subscriber for logging, RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting projectflow server...");

    let config = config.validate()?;
    if config.auth.production {
        tracing::info!("Production mode: auth cookies are marked Secure");
    }

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let app = create_app(config).await?;

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
