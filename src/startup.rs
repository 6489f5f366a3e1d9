//! Service bootstrap: weights, processor and shared state

use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::error::Result;
use crate::model::{DownloadOutcome, ModelDownloader, ModelWeights};
use crate::processor::{HttpProcessor, OmrProcessor};
use crate::AppState;

/// Run the download step for the configured weights
pub async fn download_model(settings: &Settings) -> Result<DownloadOutcome> {
    let downloader = ModelDownloader::new(&settings.model)?;
    downloader
        .ensure_model(Path::new(&settings.model.path), &settings.model.url)
        .await
}

/// Run the standalone download step, logging the outcome.
///
/// Returns whether usable weights are on disk afterwards; the `download-model`
/// binary turns this into its exit code.
pub async fn run_download(settings: &Settings) -> bool {
    match download_model(settings).await {
        Ok(DownloadOutcome::AlreadyPresent { size_bytes }) => {
            info!(size_bytes, "Model already present, skipping download");
            true
        }
        Ok(DownloadOutcome::Downloaded { size_bytes }) => {
            info!(size_bytes, "Model download successful");
            true
        }
        Ok(DownloadOutcome::NotConfigured) => {
            warn!("MODEL_URL is not set; model will not be downloaded");
            false
        }
        Err(e) => {
            error!(error = %e, "Model download failed; API will start but model-dependent endpoints will not work");
            false
        }
    }
}

/// Verify the weights and build a processor for them.
///
/// Every failure here is logged and yields `None`; the API then starts in
/// degraded mode and inference routes answer 503.
pub async fn load_processor(
    settings: &Settings,
) -> Option<(ModelWeights, Arc<dyn OmrProcessor>)> {
    if settings.model.download_on_startup {
        match download_model(settings).await {
            Ok(DownloadOutcome::NotConfigured) => {
                warn!("Model weights missing and no download URL configured");
            }
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "Model download failed; model-dependent endpoints will not work");
            }
        }
    }

    let weights = match ModelWeights::load(&settings.model.path).await {
        Ok(weights) => weights,
        Err(e) => {
            warn!(error = %e, "Model file not found; starting without a model");
            return None;
        }
    };

    match HttpProcessor::new(&settings.inference, &settings.model, &weights) {
        Ok(processor) => {
            info!(
                endpoints = settings.inference.endpoints.len(),
                model_size_mb = weights.size_mb(),
                "OMR processor ready"
            );
            Some((weights, Arc::new(processor)))
        }
        Err(e) => {
            error!(error = %e, "Failed to initialise OMR processor");
            None
        }
    }
}

/// Build the shared application state from settings
pub async fn build_state(settings: Settings) -> AppState {
    info!(
        model_path = %settings.model.path,
        model_exists = Path::new(&settings.model.path).exists(),
        "Initializing OMR Processing API"
    );

    match load_processor(&settings).await {
        Some((weights, processor)) => AppState::new(settings, Some(weights), Some(processor)),
        None => AppState::new(settings, None, None),
    }
}
