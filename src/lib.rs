//! OMR Serving API
//!
//! HTTP service that hosts an Optical Mark Recognition model: it downloads the
//! model weights on startup, forwards uploaded answer sheets to inference
//! workers, and grades detected answers against answer keys.

pub mod api;
pub mod config;
pub mod error;
pub mod grading;
pub mod middleware;
pub mod model;
pub mod processor;
pub mod startup;
pub mod telemetry;
pub mod upload;

pub use error::{AppError, Result};

use std::sync::Arc;

use grading::AnswerKeyRegistry;
use model::ModelWeights;
use processor::OmrProcessor;

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Arc<config::Settings>,
    /// Present once the weights file has been verified
    pub model: Option<Arc<ModelWeights>>,
    /// Present only when `model` is; requests needing inference check this
    pub processor: Option<Arc<dyn OmrProcessor>>,
    pub answer_keys: AnswerKeyRegistry,
}

impl AppState {
    pub fn new(
        settings: config::Settings,
        model: Option<ModelWeights>,
        processor: Option<Arc<dyn OmrProcessor>>,
    ) -> Self {
        let answer_keys = AnswerKeyRegistry::new(settings.answer_keys.clone());
        let model = model.map(Arc::new);
        let processor = if model.is_some() { processor } else { None };
        Self {
            settings: Arc::new(settings),
            model,
            processor,
            answer_keys,
        }
    }

    pub fn model_loaded(&self) -> bool {
        self.model.is_some() && self.processor.is_some()
    }

    /// The processor, or `ModelNotLoaded` when the service runs degraded
    pub fn processor(&self) -> Result<&Arc<dyn OmrProcessor>> {
        self.processor.as_ref().ok_or(AppError::ModelNotLoaded)
    }
}
