//! Periscan server - HTTP server exposing Periphery automation.

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use clap::Parser;
use periscan_server::{config, logging, routes, state};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use config::Config;
use logging::{LogConfig, LogFormat};
use state::AppState;

/// Periscan server - static-analysis automation for Xcode projects.
#[derive(Parser, Debug)]
#[command(name = "periscan-server")]
#[command(about = "HTTP server exposing Periphery scan, build, and guided-setup automation")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override port from config
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose logging (INFO level for most targets)
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging (DEBUG level)
    #[arg(short, long)]
    debug: bool,

    /// Enable trace logging (TRACE level for everything, including per-line pty traffic)
    #[arg(long)]
    trace: bool,

    /// Quiet mode (WARN and ERROR only)
    #[arg(short, long)]
    quiet: bool,

    /// Set log level for specific targets (e.g., "setup=debug" or "pty=trace")
    /// Can be specified multiple times. Targets are prefixed with "periscan::" automatically.
    #[arg(long = "log", value_name = "TARGET=LEVEL")]
    log_overrides: Vec<String>,

    /// Log output format
    #[arg(long = "log-format", value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    let log_config = LogConfig::from_cli(
        cli.verbose,
        cli.debug,
        cli.trace,
        cli.quiet,
        cli.log_overrides,
        cli.log_format,
    );
    logging::init(&log_config);

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    // Apply CLI overrides
    if let Some(port) = cli.port {
        config.port = port;
    }

    tracing::info!(target: "periscan::startup", "Loaded configuration (port: {})", config.port);

    let state = Arc::new(AppState::new(config.clone()));

    let api_routes = Router::new()
        .route("/setup", post(routes::setup::run))
        .route("/scan", post(routes::scan::run))
        .route("/build", post(routes::build::run))
        .route("/health", get(routes::health));

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!(target: "periscan::startup", "Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
