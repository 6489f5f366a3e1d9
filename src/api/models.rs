//! API request and response models

use serde::{ser::Error as _, Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::processor::OmrResult;

pub const SERVICE_NAME: &str = "OMR Processing API";

/// Base64 upload accepted by `/api/process`
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ProcessJsonRequest {
    /// Base64 encoded image, optionally as a `data:` URL
    pub image: String,
}

/// Metadata attached to every successful `/api/process` response
#[derive(Debug, Clone, Serialize)]
pub struct ProcessMetadata {
    pub filename: String,
    pub questions_detected: usize,
    pub processing_status: String,
    pub request_id: String,
    pub processed_at: chrono::DateTime<chrono::Utc>,
}

/// Worker output plus request metadata
#[derive(Debug, Clone)]
pub struct ProcessResponse {
    pub result: OmrResult,
    pub metadata: ProcessMetadata,
}

impl Serialize for ProcessResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut body = self.result.to_map_without(&["metadata"]);
        let metadata = serde_json::to_value(&self.metadata).map_err(S::Error::custom)?;
        body.insert("metadata".to_string(), metadata);
        body.serialize(serializer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Success,
    Error,
}

/// One entry of a batch response
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub filename: String,
    pub status: BatchStatus,
    pub error: Option<String>,
    pub result: Option<OmrResult>,
}

/// Keys a batch entry owns; worker values for them are dropped
const BATCH_ITEM_KEYS: &[&str] = &["filename", "status", "error"];

impl Serialize for BatchItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut body = self
            .result
            .as_ref()
            .map(|result| result.to_map_without(BATCH_ITEM_KEYS))
            .unwrap_or_default();
        body.insert("filename".to_string(), Value::String(self.filename.clone()));
        let status = serde_json::to_value(self.status).map_err(S::Error::custom)?;
        body.insert("status".to_string(), status);
        if let Some(error) = &self.error {
            body.insert("error".to_string(), Value::String(error.clone()));
        }
        body.serialize(serializer)
    }
}

impl BatchItem {
    pub fn success(filename: String, result: OmrResult) -> Self {
        Self {
            filename,
            status: BatchStatus::Success,
            error: None,
            result: Some(result),
        }
    }

    pub fn failure(filename: String, error: impl Into<String>) -> Self {
        Self {
            filename,
            status: BatchStatus::Error,
            error: Some(error.into()),
            result: None,
        }
    }
}

/// Batch processing summary
#[derive(Debug, Clone, Serialize)]
pub struct BatchResponse {
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub results: Vec<BatchItem>,
}

impl BatchResponse {
    pub fn from_items(results: Vec<BatchItem>) -> Self {
        let processed = results
            .iter()
            .filter(|r| r.status == BatchStatus::Success)
            .count();
        Self {
            total: results.len(),
            processed,
            failed: results.len() - processed,
            results,
        }
    }
}

/// Answer validation request; `answer_key_id` selects a configured key
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ValidateRequest {
    #[schema(value_type = Object)]
    pub detected_answers: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub answer_key: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_key_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct InferenceHealth {
    pub total: usize,
    pub healthy: usize,
}

/// Health check response
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub service: String,
    pub version: String,
    pub model_path: String,
    pub inference: InferenceHealth,
}

/// Model information response
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ModelInfoResponse {
    pub model_type: String,
    pub model_path: String,
    #[schema(value_type = Object)]
    pub classes: BTreeMap<u32, String>,
    pub num_classes: usize,
    pub input_size: String,
    pub supported_formats: Vec<String>,
    pub size_bytes: u64,
    #[schema(value_type = String)]
    pub loaded_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct UsageExamples {
    pub example_curl: String,
    pub example_javascript: String,
}

/// Service index served at `/`
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct IndexResponse {
    pub service: String,
    pub version: String,
    #[schema(value_type = Object)]
    pub endpoints: BTreeMap<String, String>,
    pub documentation: String,
    pub usage: UsageExamples,
}
