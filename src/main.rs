/// actorflow: actor-based data-flow engine
///
/// Main entry point for the actorflow server. Initializes configuration and starts
/// the HTTP server with flow management and execution capabilities.

use actorflow::{config::Config, server::start_server};

/// Application entry point
///
/// The server provides:
/// - Flow management API at /api/flows/*
/// - Flow runs at /api/flows/{id}/run
/// - Health check at /healthz
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration (defaults to 0.0.0.0:3004 and ./flows)
    let config = Config::default();

    start_server(config).await?;

    Ok(())
}
