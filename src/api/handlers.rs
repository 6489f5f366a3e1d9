//! HTTP request handlers

use axum::{
    extract::{Request, State},
    Json,
};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::intake::{self, BodyKind, RawUpload};
use crate::api::models::{
    BatchItem, BatchResponse, HealthResponse, IndexResponse, InferenceHealth,
    ModelInfoResponse, ProcessMetadata, ProcessResponse, UsageExamples, ValidateRequest,
    SERVICE_NAME,
};
use crate::error::{AppError, Result};
use crate::grading::{grade_answers, AnswerKey, GradeReport};
use crate::processor::{OmrProcessor, OmrResult};
use crate::upload::SheetImage;
use crate::AppState;

/// Service index with endpoint overview
#[utoipa::path(
    get,
    path = "/",
    tag = "Service",
    responses((status = 200, description = "Service overview", body = IndexResponse))
)]
pub async fn index() -> Json<IndexResponse> {
    let endpoints = BTreeMap::from([
        ("/api/health".to_string(), "GET - Health check".to_string()),
        ("/api/process".to_string(), "POST - Process single OMR sheet".to_string()),
        ("/api/batch".to_string(), "POST - Process multiple OMR sheets".to_string()),
        ("/api/validate".to_string(), "POST - Validate answers against answer key".to_string()),
        ("/api/model-info".to_string(), "GET - Get model information".to_string()),
    ]);

    Json(IndexResponse {
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints,
        documentation: "/api/docs".to_string(),
        usage: UsageExamples {
            example_curl: "curl -X POST -F \"file=@omr.jpg\" http://localhost:5000/api/process"
                .to_string(),
            example_javascript:
                "fetch(\"http://localhost:5000/api/process\", {method: \"POST\", body: formData})"
                    .to_string(),
        },
    })
}

/// Health check endpoint; always 200, `degraded` when no model is loaded
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    responses((status = 200, description = "Service health", body = HealthResponse))
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let model_loaded = state.model_loaded();
    let inference = match &state.processor {
        Some(processor) => {
            let status = processor.status();
            InferenceHealth {
                total: status.endpoints.len(),
                healthy: status.healthy_endpoints,
            }
        }
        None => InferenceHealth {
            total: 0,
            healthy: 0,
        },
    };

    Json(HealthResponse {
        status: if model_loaded { "healthy" } else { "degraded" }.to_string(),
        model_loaded,
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_path: state.settings.model.path.clone(),
        inference,
    })
}

/// Process a single OMR sheet sent as multipart `file` or JSON `image`
#[utoipa::path(
    post,
    path = "/api/process",
    tag = "OMR",
    request_body(content = ProcessJsonRequest, description = "Base64 image; multipart/form-data with a `file` field is also accepted"),
    responses(
        (status = 200, description = "Detected answers with processing metadata"),
        (status = 400, description = "No image, invalid file type or undecodable image"),
        (status = 413, description = "Image exceeds the upload limit"),
        (status = 503, description = "Model not loaded")
    )
)]
pub async fn process_omr(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<ProcessResponse>> {
    let processor = state.processor()?.clone();
    let image = intake::read_single_image(request, &state.settings.upload).await?;
    let filename = image.filename.clone();

    info!(filename = %filename, format = %image.format, bytes = image.len(), "Processing OMR sheet");

    let result = run_inference(processor.as_ref(), image).await?;

    let metadata = ProcessMetadata {
        filename,
        questions_detected: result.questions_detected(),
        processing_status: "success".to_string(),
        request_id: Uuid::new_v4().to_string(),
        processed_at: Utc::now(),
    };
    info!(
        filename = %metadata.filename,
        questions = metadata.questions_detected,
        "OMR sheet processed"
    );

    Ok(Json(ProcessResponse { result, metadata }))
}

/// Process several sheets sent as multipart `files[]`
#[utoipa::path(
    post,
    path = "/api/batch",
    tag = "OMR",
    responses(
        (status = 200, description = "Per-file results with totals"),
        (status = 400, description = "No files provided or too many files"),
        (status = 503, description = "Model not loaded")
    )
)]
pub async fn batch_process(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<BatchResponse>> {
    let processor = state.processor()?.clone();
    let uploads = intake::read_batch_uploads(request).await?;
    let limits = &state.settings.upload;

    if uploads.is_empty() {
        return Err(AppError::NoFiles);
    }
    if uploads.len() > limits.max_batch_files {
        return Err(AppError::InvalidRequest(format!(
            "Too many files: {} (maximum {})",
            uploads.len(),
            limits.max_batch_files
        )));
    }

    info!(files = uploads.len(), "Processing OMR batch");

    let concurrency = state.settings.inference.batch_concurrency.max(1);
    let results: Vec<BatchItem> = stream::iter(uploads)
        .map(|upload| process_batch_item(processor.as_ref(), upload, limits))
        .buffered(concurrency)
        .collect()
        .await;

    let response = BatchResponse::from_items(results);
    info!(
        total = response.total,
        processed = response.processed,
        failed = response.failed,
        "OMR batch completed"
    );
    Ok(Json(response))
}

async fn process_batch_item(
    processor: &dyn OmrProcessor,
    upload: RawUpload,
    limits: &crate::config::UploadConfig,
) -> BatchItem {
    let original_name = upload.filename.clone();
    let image = match intake::validate_upload(upload, limits) {
        Ok(image) => image,
        Err(AppError::FileTooLarge { .. }) => {
            return BatchItem::failure(original_name, "File too large");
        }
        Err(_) => return BatchItem::failure(original_name, "Invalid file"),
    };

    let filename = image.filename.clone();
    match run_inference(processor, image).await {
        Ok(result) => BatchItem::success(filename, result),
        Err(e) => {
            warn!(filename = %filename, error = %e, "Batch item failed");
            BatchItem::failure(filename, e.to_string())
        }
    }
}

/// Run the processor and fold worker-reported errors into `AppError`
async fn run_inference(processor: &dyn OmrProcessor, image: SheetImage) -> Result<OmrResult> {
    let result = match processor.process(image).await {
        Ok(result) => result,
        Err(e @ (AppError::NoHealthyEndpoints(_) | AppError::Processing(_))) => return Err(e),
        Err(e) => return Err(AppError::Processing(e.to_string())),
    };

    match result.error() {
        Some(message) => Err(AppError::InferenceFailed(message)),
        None => Ok(result),
    }
}

/// Grade detected answers against an inline or configured answer key
#[utoipa::path(
    post,
    path = "/api/validate",
    tag = "Grading",
    request_body = ValidateRequest,
    responses(
        (status = 200, description = "Score and per-question comparison", body = GradeReport),
        (status = 400, description = "Not JSON or missing fields"),
        (status = 404, description = "Unknown answer key id")
    )
)]
pub async fn validate_answers(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<GradeReport>> {
    if intake::body_kind(&request) != BodyKind::Json {
        return Err(AppError::NotJson);
    }
    let body = intake::read_json(request, state.settings.upload.max_request_size).await?;

    let has_key = body.get("answer_key").is_some() || body.get("answer_key_id").is_some();
    if body.get("detected_answers").is_none() || !has_key {
        return Err(AppError::MissingFields {
            required: vec!["detected_answers", "answer_key"],
        });
    }

    let request: ValidateRequest = serde_json::from_value(body)
        .map_err(|e| AppError::InvalidRequest(e.to_string()))?;

    let detected = as_answer_map(request.detected_answers, "detected_answers")?;
    let key = match (request.answer_key, request.answer_key_id.as_deref()) {
        (Some(inline), _) => as_answer_map(inline, "answer_key")?,
        (None, Some(id)) => state.answer_keys.get(id)?.clone(),
        (None, None) => {
            return Err(AppError::MissingFields {
                required: vec!["detected_answers", "answer_key"],
            })
        }
    };

    let report = grade_answers(&detected, &key);
    info!(
        score = report.score,
        total = report.total,
        grade = %report.grade,
        "Answers validated"
    );
    Ok(Json(report))
}

fn as_answer_map(value: serde_json::Value, field: &str) -> Result<AnswerKey> {
    match value {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(AppError::InvalidRequest(format!(
            "{} must be an object mapping question to answer",
            field
        ))),
    }
}

/// Information about the loaded model
#[utoipa::path(
    get,
    path = "/api/model-info",
    tag = "Model",
    responses(
        (status = 200, description = "Model metadata", body = ModelInfoResponse),
        (status = 503, description = "Model not loaded")
    )
)]
pub async fn model_info(State(state): State<Arc<AppState>>) -> Result<Json<ModelInfoResponse>> {
    let processor = state.processor()?;
    let weights = state.model.as_ref().ok_or(AppError::ModelNotLoaded)?;
    let classes = processor.model_classes().await?;
    let settings = &state.settings;

    Ok(Json(ModelInfoResponse {
        model_type: settings.model.model_type.clone(),
        model_path: settings.model.path.clone(),
        num_classes: classes.len(),
        classes,
        input_size: settings.model.input_size.clone(),
        supported_formats: settings.upload.allowed_extensions.clone(),
        size_bytes: weights.size_bytes,
        loaded_at: weights.loaded_at,
    }))
}

/// JSON 404 for unknown routes
pub async fn not_found() -> AppError {
    AppError::NotFound
}
