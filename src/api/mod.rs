/// HTTP API Layer
///
/// This module provides the REST API endpoints for flow management and
/// execution. It handles:
/// - Flow CRUD operations with validation and hot-reload
/// - Synchronous flow runs with optional trace and timeout

// Flow management endpoints (POST/GET/PUT/DELETE)
pub mod flows;

// Flow execution endpoint
pub mod runs;

use crate::{
    flow::{registry::FlowRegistry, storage::FlowStorage},
    runtime::engine::ExecutionEngine,
};
use axum::{http::StatusCode, response::Json};
use serde_json::{json, Value};
use std::{fmt::Display, sync::Arc};

// Re-export router builders
pub use flows::create_flow_routes;
pub use runs::create_run_routes;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    /// Flow storage for persistence
    pub storage: FlowStorage,
    /// Hot-reload registry for compiled flows
    pub registry: Arc<FlowRegistry>,
    /// Engine executing runs
    pub engine: Arc<ExecutionEngine>,
}

/// Error response: status plus `{ "error": "..." }`
pub type ApiError = (StatusCode, Json<Value>);

pub fn api_error(status: StatusCode, message: impl Display) -> ApiError {
    (status, Json(json!({ "error": message.to_string() })))
}
