/// Server setup and initialization
///
/// Wires together all components: storage, registry, execution engine, and HTTP routes.
/// Provides the main application factory function for creating the Axum app.

use crate::{
    api::{create_flow_routes, create_run_routes, AppState},
    config::Config,
    flow::{registry::FlowRegistry, storage::FlowStorage},
    runtime::engine::ExecutionEngine,
};
use anyhow::Result;
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Create the main Axum application with all routes
///
/// Initializes storage, loads every stored flow into the registry and
/// builds the execution engine from the configured defaults.
pub async fn create_app(config: Config) -> Result<Router> {
    tracing::info!("📁 Ensuring flow definitions directory exists: {}", config.flows.definitions_dir);
    let storage = FlowStorage::new(&config.flows.definitions_dir);
    storage
        .init()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create flow definitions directory: {}", e))?;

    tracing::info!("📊 Initializing flow registry");
    let registry = Arc::new(FlowRegistry::new(storage.clone()));

    tracing::info!("📥 Loading existing flows from storage");
    registry
        .init_from_storage()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load flows from storage: {}", e))?;

    tracing::info!(
        "🚀 Initializing execution engine ({})",
        config.execution.error_handling
    );
    let engine = Arc::new(ExecutionEngine::new(
        config.execution.error_handling,
        config.execution_settings(),
    ));

    let app_state = AppState {
        storage,
        registry,
        engine,
    };

    tracing::info!("📡 Creating HTTP router with all endpoints");
    let app = Router::new()
        .route("/healthz", get(health_check))
        .merge(create_flow_routes())
        .merge(create_run_routes())
        .with_state(app_state);

    tracing::info!("✅ Application initialized successfully");

    Ok(app)
}

/// Start the HTTP server with the given configuration
///
/// RUST_LOG takes precedence over the configured log level.
pub async fn start_server(config: Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting actorflow server...");

    let app = create_app(config.clone()).await?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "ok"
}
