//! Scan route handler.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use periscan_core::{run_scan, ScanOptions};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::state::AppState;

#[derive(Deserialize)]
pub struct ScanRequest {
    pub project_path: String,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

/// Run a scan, setting the project up first when it has no
/// configuration yet.
pub async fn run(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ScanRequest>,
) -> Response {
    let _permit = match state.jobs.acquire().await {
        Ok(permit) => permit,
        Err(_) => return (StatusCode::SERVICE_UNAVAILABLE, "server shutting down").into_response(),
    };

    info!(target: "periscan::api", "Scan requested for {}", req.project_path);

    let opts = ScanOptions {
        periphery_path: state.config.periphery_path.clone(),
        xcodebuild_path: state.config.xcodebuild_path.clone(),
        extra_args: req.extra_args,
        project_dir: PathBuf::from(req.project_path),
    };
    Json(run_scan(opts).await).into_response()
}
