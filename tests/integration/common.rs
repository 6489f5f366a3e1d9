//! Shared fixtures for integration tests

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, Response},
    Router,
};
use chrono::Utc;
use omr_serving_api::{
    api::routes::create_router,
    config::Settings,
    error::{AppError, Result},
    model::ModelWeights,
    processor::{OmrProcessor, OmrResult, ProcessorStatus},
    upload::SheetImage,
    AppState,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

pub const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13, b'I', b'H'];
pub const BOUNDARY: &str = "omr-test-boundary";

/// A complete, decodable PNG
pub fn png_image() -> Vec<u8> {
    let mut bytes = std::io::Cursor::new(Vec::new());
    image::RgbImage::new(8, 8)
        .write_to(&mut bytes, image::ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

/// Processor double: filenames containing `crash` fail, `blank` yields a worker
/// error, `partial` returns fields that clash with the service's own
pub struct MockProcessor;

#[async_trait]
impl OmrProcessor for MockProcessor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn process(&self, image: SheetImage) -> Result<OmrResult> {
        if image.filename.contains("crash") {
            return Err(AppError::Processing("worker crashed".to_string()));
        }
        let value = if image.filename.contains("blank") {
            json!({"error": "No answer grid detected"})
        } else if image.filename.contains("partial") {
            json!({
                "answers": {"1": "A"},
                "status": "partial",
                "filename": "worker.jpg",
                "metadata": {"source": "worker"}
            })
        } else {
            json!({"answers": {"1": "A", "2": "C", "3": "B"}, "roll_number": "042"})
        };
        Ok(serde_json::from_value(value).unwrap())
    }

    async fn model_classes(&self) -> Result<BTreeMap<u32, String>> {
        Ok(BTreeMap::from([
            (0, "filled".to_string()),
            (1, "unfilled".to_string()),
        ]))
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn status(&self) -> ProcessorStatus {
        ProcessorStatus {
            name: "mock".to_string(),
            endpoints: vec!["mock://worker".to_string()],
            healthy_endpoints: 1,
        }
    }
}

pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.logging.format = "pretty".to_string();
    settings
}

pub fn loaded_app(settings: Settings) -> Router {
    let weights = ModelWeights {
        path: PathBuf::from(&settings.model.path),
        size_bytes: 6_000_000,
        loaded_at: Utc::now(),
    };
    let state = AppState::new(settings, Some(weights), Some(Arc::new(MockProcessor)));
    create_router(Arc::new(state))
}

pub fn degraded_app(settings: Settings) -> Router {
    create_router(Arc::new(AppState::new(settings, None, None)))
}

/// Build a multipart body from `(field, filename, bytes)` parts
pub fn multipart_body(parts: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (field, filename, bytes) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                field, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_request(uri: &str, parts: &[(&str, &str, &[u8])]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

pub fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
