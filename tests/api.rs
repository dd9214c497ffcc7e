use actorflow::{config::Config, server::create_app};
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

async fn app(dir: &TempDir) -> Router {
    let mut config = Config::default();
    config.flows.definitions_dir = dir.path().join("flows").to_string_lossy().into_owned();
    create_app(config).await.unwrap()
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(body) => {
            request = request.header("content-type", "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn clustering_flow(id: &str) -> Value {
    json!({
        "flow": {
            "id": id,
            "name": "Clustering",
            "actors": [
                {
                    "name": "cluster",
                    "type": "cluster_data",
                    "params": {
                        "clusterer": { "algorithm": "leader", "threshold": 2.0, "leaders": [[0.0, 0.0]] },
                        "update_model": true
                    }
                },
                { "name": "pick", "type": "container_value_picker", "params": { "key": "Cluster" } }
            ]
        }
    })
}

#[tokio::test]
async fn health_check_answers() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir).await;

    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn flow_crud_round() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir).await;

    let (status, _) = call(&app, Method::POST, "/api/flows", Some(clustering_flow("leader"))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = call(&app, Method::POST, "/api/flows", Some(clustering_flow("leader"))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = call(&app, Method::GET, "/api/flows", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["flows"][0]["id"], "leader");
    assert_eq!(body["flows"][0]["actors"], 2);

    let (status, body) = call(&app, Method::GET, "/api/flows/leader", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["actors"][0]["type"], "cluster_data");

    let mut renamed = clustering_flow("ignored");
    renamed["flow"]["name"] = json!("Renamed");
    let (status, _) = call(&app, Method::PUT, "/api/flows/leader", Some(renamed)).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = call(&app, Method::GET, "/api/flows/leader", None).await;
    assert_eq!(body["name"], "Renamed");

    let (status, _) = call(&app, Method::DELETE, "/api/flows/leader", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, Method::GET, "/api/flows/leader", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&app, Method::POST, "/api/flows/leader/run", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_flows_are_rejected() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir).await;

    let broken = json!({
        "flow": {
            "id": "broken",
            "name": "Broken",
            "actors": [{ "name": "t", "type": "trigger_event", "params": { "event": "ghost" } }]
        }
    });
    let (status, body) = call(&app, Method::POST, "/api/flows", Some(broken)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("ghost"));

    let (status, _) = call(&app, Method::GET, "/api/flows/broken", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, Method::PUT, "/api/flows/missing", Some(clustering_flow("missing"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn runs_stored_flow_with_inputs() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir).await;
    call(&app, Method::POST, "/api/flows", Some(clustering_flow("leader"))).await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/flows/leader/run",
        Some(json!({ "inputs": [[0.0, 0.0], [0.5, 0.5], [10.0, 10.0], [10.0, 10.0]], "trace": true })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    // the far instance opens a new cluster after being assigned
    assert_eq!(body["outputs"], json!([0, 0, 0, 1]));
    assert_eq!(body["flow_id"], "leader");
    assert_eq!(body["stopped"], false);
    assert!(!body["trace"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn flows_survive_restart() {
    let dir = TempDir::new().unwrap();
    {
        let app = app(&dir).await;
        call(&app, Method::POST, "/api/flows", Some(clustering_flow("leader"))).await;
    }

    let app = app(&dir).await;
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/flows/leader/run",
        Some(json!({ "inputs": [[1.0, 1.0]] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outputs"], json!([0]));
    assert!(body.get("trace").is_none());
}

#[tokio::test]
async fn inputs_for_source_flow_are_bad_requests() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir).await;
    let source = json!({
        "flow": {
            "id": "counter",
            "name": "Counter",
            "actors": [{ "name": "loop", "type": "for_loop", "params": { "end": 3 } }]
        }
    });
    call(&app, Method::POST, "/api/flows", Some(source)).await;

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/flows/counter/run",
        Some(json!({ "inputs": [1] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(&app, Method::POST, "/api/flows/counter/run", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outputs"], json!([1, 2, 3]));
}
