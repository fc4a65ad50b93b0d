/// projectflow: workflow template management for project teams
///
/// Main entry point. Loads configuration from the environment and starts the
/// HTTP server.

use projectflow::{config::Config, server::start_server};

/// Application entry point
///
/// The server provides:
/// - Authentication API at /api/auth/*
/// - Workflow management API at /api/workflows/*
/// - Login and dashboard pages at /login and /dashboard
/// - Health check at /healthz
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration (defaults to 0.0.0.0:3004 and data/projectflow.db)
    let config = Config::default();

    start_server(config).await?;

    Ok(())
}
