//! API endpoint integration tests

use crate::common::*;
use axum::{body::Body, http::Request, http::StatusCode};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::json;
use std::collections::BTreeMap;

#[tokio::test]
async fn test_index() {
    let response = send(loaded_app(test_settings()), get_request("/")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["service"], "OMR Processing API");
    assert_eq!(body["documentation"], "/api/docs");
    assert!(body["endpoints"]["/api/process"].is_string());
}

#[tokio::test]
async fn test_health_degraded_without_model() {
    let response = send(degraded_app(test_settings()), get_request("/api/health")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["model_loaded"], false);
    assert_eq!(body["version"], "1.0.0");
    assert_eq!(body["model_path"], "best.pt");
}

#[tokio::test]
async fn test_health_with_model() {
    let body = body_json(send(loaded_app(test_settings()), get_request("/api/health")).await).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_loaded"], true);
    assert_eq!(body["service"], "OMR Processing API");
    assert_eq!(body["inference"]["healthy"], 1);
}

#[tokio::test]
async fn test_process_without_model() {
    let request = multipart_request("/api/process", &[("file", "sheet.png", PNG)]);
    let response = send(degraded_app(test_settings()), request).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = body_json(response).await;
    assert_eq!(body["error"], "Model not loaded");
    assert!(body["message"].as_str().unwrap().contains("server logs"));
}

#[tokio::test]
async fn test_process_multipart() {
    let request = multipart_request("/api/process", &[("file", "class 7 sheet.png", PNG)]);
    let response = send(loaded_app(test_settings()), request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["answers"]["2"], "C");
    assert_eq!(body["roll_number"], "042");
    assert_eq!(body["metadata"]["filename"], "class_7_sheet.png");
    assert_eq!(body["metadata"]["questions_detected"], 3);
    assert_eq!(body["metadata"]["processing_status"], "success");
}

#[tokio::test]
async fn test_process_base64() {
    let encoded = format!("data:image/png;base64,{}", STANDARD.encode(png_image()));
    let request = json_request("/api/process", json!({"image": encoded}));
    let response = send(loaded_app(test_settings()), request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["metadata"]["filename"], "base64_image.png");
}

#[tokio::test]
async fn test_process_invalid_base64() {
    let request = json_request("/api/process", json!({"image": "@@@"}));
    let response = send(loaded_app(test_settings()), request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid base64 image");
}

#[tokio::test]
async fn test_process_base64_header_only() {
    let request = json_request("/api/process", json!({"image": STANDARD.encode(PNG)}));
    let response = send(loaded_app(test_settings()), request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid base64 image");
}

#[tokio::test]
async fn test_process_no_image() {
    let request = json_request("/api/process", json!({"something": "else"}));
    let response = send(loaded_app(test_settings()), request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"], "No image provided");
    assert!(body["help"].is_string());
}

#[tokio::test]
async fn test_process_wrong_field_name() {
    let request = multipart_request("/api/process", &[("upload", "sheet.png", PNG)]);
    let response = send(loaded_app(test_settings()), request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No image provided");
}

#[tokio::test]
async fn test_process_empty_filename() {
    let request = multipart_request("/api/process", &[("file", "", PNG)]);
    let response = send(loaded_app(test_settings()), request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No file selected");
}

#[tokio::test]
async fn test_process_invalid_file_type() {
    let request = multipart_request("/api/process", &[("file", "sheet.gif", PNG)]);
    let response = send(loaded_app(test_settings()), request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid file type");
    assert_eq!(body["allowed_types"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_process_file_too_large() {
    let mut settings = test_settings();
    settings.upload.max_file_size = 8;
    let request = multipart_request("/api/process", &[("file", "sheet.png", PNG)]);
    let response = send(loaded_app(settings), request).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_process_worker_error() {
    let request = multipart_request("/api/process", &[("file", "blank.png", PNG)]);
    let response = send(loaded_app(test_settings()), request).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "No answer grid detected");
}

#[tokio::test]
async fn test_process_worker_failure() {
    let request = multipart_request("/api/process", &[("file", "crash.png", PNG)]);
    let response = send(loaded_app(test_settings()), request).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = body_json(response).await;
    assert_eq!(body["error"], "worker crashed");
    assert_eq!(body["processing_status"], "failed");
}

#[tokio::test]
async fn test_batch_mixed_results() {
    let request = multipart_request(
        "/api/batch",
        &[
            ("files[]", "first.png", PNG),
            ("files[]", "notes.gif", PNG),
            ("files[]", "crash.png", PNG),
            ("files[]", "blank.png", PNG),
        ],
    );
    let response = send(loaded_app(test_settings()), request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["total"], 4);
    assert_eq!(body["processed"], 1);
    assert_eq!(body["failed"], 3);

    let results = body["results"].as_array().unwrap();
    assert_eq!(results[0]["filename"], "first.png");
    assert_eq!(results[0]["status"], "success");
    assert_eq!(results[0]["answers"]["1"], "A");
    assert_eq!(results[1]["filename"], "notes.gif");
    assert_eq!(results[1]["error"], "Invalid file");
    assert_eq!(results[2]["error"], "worker crashed");
    assert_eq!(results[3]["error"], "No answer grid detected");
}

#[tokio::test]
async fn test_batch_service_fields_win() {
    let request = multipart_request(
        "/api/batch",
        &[("files[]", "partial.png", PNG), ("files[]", "first.png", PNG)],
    );
    let body = body_json(send(loaded_app(test_settings()), request).await).await;

    assert_eq!(body["processed"], 2);
    let first = &body["results"][0];
    assert_eq!(first["filename"], "partial.png");
    assert_eq!(first["status"], "success");
    assert_eq!(first["answers"]["1"], "A");
}

#[tokio::test]
async fn test_process_metadata_wins() {
    let request = multipart_request("/api/process", &[("file", "partial.png", PNG)]);
    let body = body_json(send(loaded_app(test_settings()), request).await).await;

    assert_eq!(body["metadata"]["filename"], "partial.png");
    assert_eq!(body["metadata"]["processing_status"], "success");
    assert!(body["metadata"].get("source").is_none());
}

#[tokio::test]
async fn test_batch_accepts_files_field() {
    let request = multipart_request(
        "/api/batch",
        &[("files", "a.png", PNG), ("files", "b.png", PNG)],
    );
    let response = send(loaded_app(test_settings()), request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["results"][1]["filename"], "b.png");
}

#[tokio::test]
async fn test_request_body_limit() {
    let mut settings = test_settings();
    settings.upload.max_request_size = 64;
    let big = vec![0u8; 1024];

    let request = multipart_request("/api/process", &[("file", "sheet.png", big.as_slice())]);
    let response = send(loaded_app(settings.clone()), request).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let request = json_request(
        "/api/validate",
        json!({"detected_answers": {"1": "A".repeat(200)}, "answer_key": {"1": "A"}}),
    );
    let response = send(loaded_app(settings), request).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_batch_without_files() {
    let request = multipart_request("/api/batch", &[("file", "one.png", PNG)]);
    let response = send(loaded_app(test_settings()), request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No files provided");
}

#[tokio::test]
async fn test_batch_too_many_files() {
    let mut settings = test_settings();
    settings.upload.max_batch_files = 1;
    let request = multipart_request(
        "/api/batch",
        &[("files[]", "a.png", PNG), ("files[]", "b.png", PNG)],
    );
    let response = send(loaded_app(settings), request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_validate_inline_key() {
    let request = json_request(
        "/api/validate",
        json!({
            "detected_answers": {"1": "A", "2": "B", "3": "C", "4": "D"},
            "answer_key": {"1": "A", "2": "B", "3": "C", "4": "A"}
        }),
    );
    let response = send(degraded_app(test_settings()), request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["score"], 3);
    assert_eq!(body["total"], 4);
    assert_eq!(body["percentage"], 75.0);
    assert_eq!(body["grade"], "B");
    assert_eq!(body["comparison"][3]["is_correct"], false);
    assert_eq!(body["comparison"][3]["detected"], "D");
}

#[tokio::test]
async fn test_validate_configured_key() {
    let mut settings = test_settings();
    let key = json!({"1": "A", "2": "B"}).as_object().cloned().unwrap();
    settings.answer_keys = BTreeMap::from([("midterm".to_string(), key)]);

    let request = json_request(
        "/api/validate",
        json!({"detected_answers": {"1": "A"}, "answer_key_id": "midterm"}),
    );
    let body = body_json(send(degraded_app(settings), request).await).await;
    assert_eq!(body["score"], 1);
    assert_eq!(body["comparison"][1]["detected"], serde_json::Value::Null);

    let request = json_request(
        "/api/validate",
        json!({"detected_answers": {}, "answer_key_id": "final"}),
    );
    let response = send(degraded_app(test_settings()), request).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_validate_missing_fields() {
    let request = json_request("/api/validate", json!({"detected_answers": {}}));
    let response = send(degraded_app(test_settings()), request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"], "Missing required fields");
    assert_eq!(body["required"], json!(["detected_answers", "answer_key"]));
}

#[tokio::test]
async fn test_validate_requires_json() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/validate")
        .header("content-type", "text/plain")
        .body(Body::from("detected_answers=1"))
        .unwrap();
    let response = send(degraded_app(test_settings()), request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Request must be JSON");
}

#[tokio::test]
async fn test_model_info() {
    let response = send(loaded_app(test_settings()), get_request("/api/model-info")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["model_type"], "YOLOv8");
    assert_eq!(body["input_size"], "640x640");
    assert_eq!(body["num_classes"], 2);
    assert_eq!(body["classes"]["0"], "filled");
    assert_eq!(body["supported_formats"].as_array().unwrap().len(), 5);
    assert_eq!(body["size_bytes"], 6_000_000);
    assert!(body["loaded_at"].is_string());
}

#[tokio::test]
async fn test_model_info_without_model() {
    let response = send(degraded_app(test_settings()), get_request("/api/model-info")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_unknown_route() {
    let response = send(loaded_app(test_settings()), get_request("/api/unknown")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["error"], "Endpoint not found");
    assert!(body["available_endpoints"]
        .as_array()
        .unwrap()
        .contains(&json!("/api/process")));
}

#[tokio::test]
async fn test_api_key_required_when_configured() {
    let mut settings = test_settings();
    settings.auth.enabled = true;
    settings.auth.api_keys = vec!["s3cret".to_string()];

    let validate = || {
        json_request(
            "/api/validate",
            json!({"detected_answers": {"1": "A"}, "answer_key": {"1": "A"}}),
        )
    };

    let response = send(loaded_app(settings.clone()), validate()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut request = validate();
    request
        .headers_mut()
        .insert("authorization", "Bearer s3cret".parse().unwrap());
    let response = send(loaded_app(settings.clone()), request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut request = validate();
    request
        .headers_mut()
        .insert("x-api-key", "s3cret".parse().unwrap());
    let response = send(loaded_app(settings.clone()), request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(loaded_app(settings), get_request("/api/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_cors_preflight() {
    let mut settings = test_settings();
    settings.auth.enabled = true;
    settings.auth.api_keys = vec!["s3cret".to_string()];

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/process")
        .header("origin", "https://school.example")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .body(Body::empty())
        .unwrap();
    let response = send(loaded_app(settings), request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "*"
    );
}

#[tokio::test]
async fn test_cors_allow_list() {
    let mut settings = test_settings();
    settings.cors.allowed_origins = vec!["https://school.example".to_string()];

    let mut request = get_request("/api/health");
    request
        .headers_mut()
        .insert("origin", "https://school.example".parse().unwrap());
    let response = send(loaded_app(settings.clone()), request).await;
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "https://school.example"
    );

    let mut request = get_request("/api/health");
    request
        .headers_mut()
        .insert("origin", "https://elsewhere.example".parse().unwrap());
    let response = send(loaded_app(settings), request).await;
    assert!(response.headers().get("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn test_rate_limit() {
    let mut settings = test_settings();
    settings.rate_limit.enabled = true;
    settings.rate_limit.requests_per_second = 1;
    settings.rate_limit.burst_size = 1;
    let app = loaded_app(settings);

    let first = send(app.clone(), get_request("/api/model-info")).await;
    assert_eq!(first.status(), StatusCode::OK);
    let second = send(app, get_request("/api/model-info")).await;
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}
