//! Guided-setup route handler.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use periscan_core::{run_guided_setup, write_config, SetupOptions};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::state::AppState;

#[derive(Deserialize)]
pub struct SetupRequest {
    pub project_path: String,
}

/// Run the tool's guided setup for a project and persist the captured
/// configuration on success.
pub async fn run(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SetupRequest>,
) -> Response {
    let _permit = match state.jobs.acquire().await {
        Ok(permit) => permit,
        Err(_) => return (StatusCode::SERVICE_UNAVAILABLE, "server shutting down").into_response(),
    };

    let project_dir = PathBuf::from(&req.project_path);
    info!(target: "periscan::api", "Setup requested for {:?}", project_dir);

    let opts = SetupOptions {
        periphery_path: state.config.periphery_path.clone(),
        xcodebuild_path: state.config.xcodebuild_path.clone(),
        ..SetupOptions::new(&project_dir)
    };
    let outcome = run_guided_setup(opts).await;

    if outcome.success {
        if let Some(yml) = &outcome.yml {
            if let Err(e) = write_config(&project_dir, yml) {
                warn!(target: "periscan::api", "Could not persist configuration: {}", e);
            }
        }
    }

    Json(outcome).into_response()
}
