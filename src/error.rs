//! Application error type and its HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, AppError>;

/// Endpoints advertised by the 404 handler
pub const AVAILABLE_ENDPOINTS: &[&str] = &[
    "/api/process",
    "/api/batch",
    "/api/validate",
    "/api/health",
    "/api/model-info",
];

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Model not loaded")]
    ModelNotLoaded,

    #[error("No image provided")]
    NoImage,

    #[error("No file selected")]
    EmptyFilename,

    #[error("Invalid file type")]
    InvalidFileType { allowed_types: Vec<String> },

    #[error("Invalid base64 image")]
    InvalidBase64Image,

    #[error("File too large")]
    FileTooLarge { limit: usize },

    #[error("No files provided")]
    NoFiles,

    #[error("Request must be JSON")]
    NotJson,

    #[error("Missing required fields")]
    MissingFields { required: Vec<&'static str> },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unknown answer key: {0}")]
    UnknownAnswerKey(String),

    #[error("Invalid or missing API key")]
    Unauthorized,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Endpoint not found")]
    NotFound,

    #[error("{0}")]
    Processing(String),

    #[error("{0}")]
    InferenceFailed(String),

    #[error("No healthy inference endpoints for '{0}'")]
    NoHealthyEndpoints(String),

    #[error("Model download failed: {0}")]
    Download(String),

    #[error("Model weights unavailable: {0}")]
    ModelWeights(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Multipart form error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ModelNotLoaded | AppError::NoHealthyEndpoints(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::NoImage
            | AppError::EmptyFilename
            | AppError::InvalidFileType { .. }
            | AppError::InvalidBase64Image
            | AppError::NotJson
            | AppError::MissingFields { .. }
            | AppError::InvalidRequest(_)
            | AppError::NoFiles => StatusCode::BAD_REQUEST,
            AppError::Multipart(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            AppError::Multipart(_) => StatusCode::BAD_REQUEST,
            AppError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::UnknownAnswerKey(_) | AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Processing(_)
            | AppError::InferenceFailed(_)
            | AppError::Download(_)
            | AppError::ModelWeights(_)
            | AppError::Config(_)
            | AppError::Io(_)
            | AppError::HttpClient(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        let mut body = ErrorBody::new(self.to_string());
        match self {
            AppError::ModelNotLoaded => {
                body.message = Some(
                    "OMR processor is not available. Please check server logs.".to_string(),
                );
            }
            AppError::NoHealthyEndpoints(_) => {
                body.message = Some("Inference workers are unreachable.".to_string());
            }
            AppError::NoImage => {
                body.help = Some(
                    "Send image as multipart/form-data with \"file\" field or as JSON with \"image\" (base64) field"
                        .to_string(),
                );
            }
            AppError::FileTooLarge { limit } => {
                body.message = Some(format!("Maximum upload size is {} bytes", limit));
            }
            AppError::InvalidFileType { allowed_types } => {
                body.allowed_types = Some(allowed_types.clone());
            }
            AppError::MissingFields { required } => {
                body.required = Some(required.iter().map(|f| f.to_string()).collect());
            }
            AppError::NotFound => {
                body.available_endpoints =
                    Some(AVAILABLE_ENDPOINTS.iter().map(|e| e.to_string()).collect());
            }
            AppError::Processing(_) => {
                body.processing_status = Some("failed");
            }
            _ => {}
        }
        body
    }
}

/// JSON error payload; detail fields only appear for the errors that carry them
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_endpoints: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_status: Option<&'static str>,
}

impl ErrorBody {
    fn new(error: String) -> Self {
        Self {
            error,
            message: None,
            help: None,
            allowed_types: None,
            required: None,
            available_endpoints: None,
            processing_status: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = %status, error = %self, "Request failed");
        }
        (status, Json(self.body())).into_response()
    }
}
