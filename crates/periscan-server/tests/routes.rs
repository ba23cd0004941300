//! Integration tests for the HTTP surface.
//!
//! These verify the JSON contract of the tool routes: errors are
//! reported in-band as structured outcomes, never as HTTP failures.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    routing::{get, post},
    Router,
};
use periscan_server::{config::Config, routes, state::AppState};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

/// Build a router over a config whose tool binaries are stand-ins.
fn test_app() -> Router {
    let config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        periphery_path: PathBuf::from("/usr/bin/true"),
        xcodebuild_path: PathBuf::from("/usr/bin/true"),
        max_concurrent_jobs: 2,
    };
    let state = Arc::new(AppState::new(config));

    Router::new()
        .route("/api/health", get(routes::health))
        .route("/api/setup", post(routes::setup::run))
        .route("/api/scan", post(routes::scan::run))
        .route("/api/build", post(routes::build::run))
        .with_state(state)
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

#[tokio::test]
async fn health_reports_ok() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn setup_reports_missing_project_in_band() {
    let (status, json) = post_json(
        test_app(),
        "/api/setup",
        serde_json::json!({"project_path": "/no/such/project"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], false);
    assert!(json["yml"].is_null());
    assert!(json["log_tail"][0]
        .as_str()
        .unwrap()
        .contains("does not exist"));
}

#[tokio::test]
async fn scan_reports_missing_project_in_band() {
    let (status, json) = post_json(
        test_app(),
        "/api/scan",
        serde_json::json!({"project_path": "/no/such/project"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["build_ok"], false);
    assert!(json["build_error"]["summary"]
        .as_str()
        .unwrap()
        .contains("does not exist"));
}

#[tokio::test]
async fn build_reports_missing_project_in_band() {
    let (status, json) = post_json(
        test_app(),
        "/api/build",
        serde_json::json!({"project_path": "/no/such/project"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["build_ok"], false);
}

#[tokio::test]
async fn setup_persists_nothing_for_descriptorless_projects() {
    let dir = tempfile::TempDir::new().unwrap();
    let (status, json) = post_json(
        test_app(),
        "/api/setup",
        serde_json::json!({"project_path": dir.path()}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], false);
    assert!(!dir.path().join(".periphery.yml").exists());
}
