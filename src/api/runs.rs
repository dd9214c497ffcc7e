/// Flow execution endpoint
///
/// Runs a registered flow synchronously and returns the execution result.
/// A run can be bounded by `timeout_ms`, after which the whole flow is
/// stopped cooperatively.

use crate::{
    api::{api_error, ApiError, AppState},
    runtime::{
        engine::{ExecutionResult, RunOptions},
        stop::StopHandle,
    },
};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::post,
    Router,
};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Request body for a run; every field is optional
#[derive(Debug, Default, Deserialize)]
pub struct RunRequest {
    /// One run of the main chain per input; none means a single run without input
    #[serde(default)]
    pub inputs: Vec<Value>,
    /// Include listener notifications in the result
    #[serde(default)]
    pub trace: bool,
    /// Stop the flow after this many milliseconds
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

pub fn create_run_routes() -> Router<AppState> {
    Router::new().route("/api/flows/{id}/run", post(run_flow))
}

/// POST /api/flows/{id}/run
/// Body: { "inputs": [...], "trace": false, "timeout_ms": 5000 }
async fn run_flow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<ExecutionResult>, ApiError> {
    let request: RunRequest = if body.is_empty() {
        RunRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?
    };
    let compiled = state
        .registry
        .get_flow(&id)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Flow not found: {}", id)))?;

    if !request.inputs.is_empty() && !compiled.accepts_input {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("Flow '{}' takes no inputs", id),
        ));
    }

    let stop = StopHandle::new(format!("run of {}", id));
    let watchdog = request.timeout_ms.map(|ms| {
        let stop = stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            tracing::warn!("⏰ Run timed out after {}ms", ms);
            stop.stop(Some(format!("run timed out after {}ms", ms)));
        })
    });

    let options = RunOptions {
        trace: request.trace,
        stop: Some(stop),
    };
    let result = state.engine.run(&compiled, request.inputs, options).await;
    if let Some(watchdog) = watchdog {
        watchdog.abort();
    }

    result.map(Json).map_err(|e| {
        tracing::warn!("Run of flow {} could not start: {}", id, e);
        api_error(StatusCode::UNPROCESSABLE_ENTITY, e)
    })
}
