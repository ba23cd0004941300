//! Build route handler.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use periscan_core::{run_build, BuildOptions};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::state::AppState;

#[derive(Deserialize)]
pub struct BuildRequest {
    pub project_path: String,
    pub scheme: Option<String>,
}

/// Try to build the project with the external build tool.
pub async fn run(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BuildRequest>,
) -> Response {
    let _permit = match state.jobs.acquire().await {
        Ok(permit) => permit,
        Err(_) => return (StatusCode::SERVICE_UNAVAILABLE, "server shutting down").into_response(),
    };

    info!(
        target: "periscan::api",
        "Build requested for {} (scheme: {:?})", req.project_path, req.scheme
    );

    let opts = BuildOptions {
        xcodebuild_path: state.config.xcodebuild_path.clone(),
        scheme: req.scheme,
        project_dir: PathBuf::from(req.project_path),
    };
    Json(run_build(opts).await).into_response()
}
