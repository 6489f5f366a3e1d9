//! Fetch model weights ahead of server start.
//!
//! Exits 0 when the weights are on disk afterwards, 1 otherwise. A non-zero
//! exit does not prevent the API from starting; it runs degraded.

use omr_serving_api::{config::Settings, startup, telemetry::init_tracing};
use std::process::ExitCode;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let _ = dotenvy::dotenv();

    let settings = Settings::load()?;
    init_tracing(&settings.logging);

    info!(
        path = %settings.model.path,
        url_configured = !settings.model.url.is_empty(),
        "Model download step"
    );

    if startup::run_download(&settings).await {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
