//! Main entry point for the OMR Processing API

use omr_serving_api::{
    api, config::Settings, processor::HealthMonitor, startup, telemetry::init_tracing,
};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to read .env file: {}", e);
        }
    }

    // Load configuration
    let settings = Settings::load()?;
    init_tracing(&settings.logging);
    settings.validate()?;

    info!(
        host = %settings.server.host,
        port = settings.server.port,
        model_path = %settings.model.path,
        cors_origins = ?settings.cors.allowed_origins,
        auth = settings.auth.enabled,
        "Starting OMR Processing API"
    );

    let state = Arc::new(startup::build_state(settings).await);
    if !state.answer_keys.is_empty() {
        info!(answer_keys = ?state.answer_keys.names(), "Answer keys loaded");
    }
    if !state.model_loaded() {
        warn!("Model not loaded; /api/process, /api/batch and /api/model-info will return 503");
    }

    let _monitor = state.processor.as_ref().map(|processor| {
        HealthMonitor::start(
            processor.clone(),
            state.settings.inference.health_check_interval_secs,
        )
    });

    let addr = format!("{}:{}", state.settings.server.host, state.settings.server.port);
    let app = api::routes::create_router(state);

    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
