/// Flow management REST API endpoints
///
/// Provides CRUD operations for flow definitions with hot-reload support.
/// Definitions are compiled before they are stored, so an invalid flow never
/// reaches storage or the registry.

use crate::{
    api::{api_error, ApiError, AppState},
    flow::{compile_flow, types::FlowDefinition},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Response for flow creation/update operations
#[derive(Debug, Serialize)]
pub struct FlowResponse {
    pub id: String,
    pub message: String,
}

/// Request body for flow creation and update
#[derive(Debug, Deserialize)]
pub struct SaveFlowRequest {
    pub flow: FlowDefinition,
}

/// Create flow management routes
pub fn create_flow_routes() -> Router<AppState> {
    Router::new()
        .route("/api/flows", post(create_flow).get(list_flows))
        .route("/api/flows/{id}", get(get_flow).put(update_flow).delete(delete_flow))
}

/// Validate, persist and hot-load a definition
async fn store(state: &AppState, flow: FlowDefinition) -> Result<(), ApiError> {
    let compiled = compile_flow(flow).map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;
    let id = compiled.definition.id.clone();

    state
        .storage
        .save_flow(&compiled.definition)
        .await
        .map_err(|e| {
            tracing::error!("Failed to save flow {}: {}", id, e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e)
        })?;
    state.registry.reload_flow(&id).await.map_err(|e| {
        tracing::error!("Failed to reload flow {} into registry: {}", id, e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e)
    })
}

/// Create a new flow
///
/// POST /api/flows
/// Body: { "flow": { "id": "...", "name": "...", "actors": [...], "events": [...] } }
async fn create_flow(
    State(state): State<AppState>,
    Json(payload): Json<SaveFlowRequest>,
) -> Result<(StatusCode, Json<FlowResponse>), ApiError> {
    let flow = payload.flow;

    match state.storage.get_flow(&flow.id).await {
        Ok(Some(_)) => {
            return Err(api_error(
                StatusCode::CONFLICT,
                format!("Flow '{}' already exists", flow.id),
            ))
        }
        Ok(None) => {}
        Err(e) => return Err(api_error(StatusCode::BAD_REQUEST, e)),
    }

    let id = flow.id.clone();
    let name = flow.name.clone();
    store(&state, flow).await?;
    tracing::info!("🔥 Created flow: {} ({})", id, name);

    Ok((
        StatusCode::CREATED,
        Json(FlowResponse {
            id,
            message: format!("Flow '{}' created successfully", name),
        }),
    ))
}

/// List all stored flows
///
/// GET /api/flows
/// Returns: { "flows": [{ "id": "...", "name": "...", "actors": 3, "events": 1, "updated_at": "..." }] }
async fn list_flows(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    match state.storage.list_flows().await {
        Ok(flows) => Ok(Json(json!({ "flows": flows }))),
        Err(e) => {
            tracing::error!("Failed to list flows: {}", e);
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e))
        }
    }
}

/// GET /api/flows/{id}
async fn get_flow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FlowDefinition>, ApiError> {
    match state.storage.get_flow(&id).await {
        Ok(Some(flow)) => Ok(Json(flow)),
        Ok(None) => Err(api_error(StatusCode::NOT_FOUND, format!("Flow not found: {}", id))),
        Err(e) => {
            tracing::error!("Failed to get flow {}: {}", id, e);
            Err(api_error(StatusCode::BAD_REQUEST, e))
        }
    }
}

/// Replace an existing flow
///
/// PUT /api/flows/{id}
/// Body: { "flow": { ... } }; the id in the URL wins over the one in the body
async fn update_flow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<SaveFlowRequest>,
) -> Result<Json<FlowResponse>, ApiError> {
    let mut flow = payload.flow;
    flow.id = id.clone();

    match state.storage.get_flow(&id).await {
        Ok(Some(_)) => {}
        Ok(None) => return Err(api_error(StatusCode::NOT_FOUND, format!("Flow not found: {}", id))),
        Err(e) => return Err(api_error(StatusCode::BAD_REQUEST, e)),
    }

    let name = flow.name.clone();
    store(&state, flow).await?;
    tracing::info!("🔥 Hot-reloaded flow: {} ({})", id, name);

    Ok(Json(FlowResponse {
        id,
        message: format!("Flow '{}' updated successfully", name),
    }))
}

/// DELETE /api/flows/{id}
async fn delete_flow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    match state.storage.delete_flow(&id).await {
        Ok(true) => {
            state.registry.remove_flow(&id);
            tracing::info!("🗑️ Deleted flow: {}", id);
            Ok(Json(json!({ "message": format!("Flow '{}' deleted successfully", id) })))
        }
        Ok(false) => Err(api_error(StatusCode::NOT_FOUND, format!("Flow not found: {}", id))),
        Err(e) => {
            tracing::error!("Failed to delete flow {}: {}", id, e);
            Err(api_error(StatusCode::BAD_REQUEST, e))
        }
    }
}
