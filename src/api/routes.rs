//! HTTP route definitions

use crate::api::handlers;
use crate::api::models::*;
use crate::config::CorsConfig;
use crate::grading::{GradeReport, QuestionComparison};
use crate::middleware::{
    auth::{require_api_key, ApiKeys, API_KEY_HEADER},
    rate_limit::{build_limiter, rate_limit},
};
use crate::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "OMR Processing API",
        description = "Optical Mark Recognition for scanned answer sheets.",
        license(name = "MIT"),
    ),
    servers(
        (url = "http://localhost:5000", description = "Local development server")
    ),
    paths(
        handlers::index,
        handlers::health_check,
        handlers::process_omr,
        handlers::batch_process,
        handlers::validate_answers,
        handlers::model_info,
    ),
    components(schemas(
        ProcessJsonRequest,
        ValidateRequest,
        GradeReport,
        QuestionComparison,
        HealthResponse,
        InferenceHealth,
        ModelInfoResponse,
        IndexResponse,
        UsageExamples,
    )),
    tags(
        (name = "Service", description = "Service overview"),
        (name = "Health", description = "Health and monitoring endpoints"),
        (name = "OMR", description = "Answer sheet processing"),
        (name = "Grading", description = "Scoring against answer keys"),
        (name = "Model", description = "Model information"),
    )
)]
pub struct ApiDoc;

/// Build the CORS layer from the configured origins
pub fn cors_layer(cors: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(API_KEY_HEADER),
        ]);

    if cors.allows_any() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = cors
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let settings = state.settings.clone();

    // Routes that need the model or may be gated by an API key
    let protected = Router::new()
        .route("/process", post(handlers::process_omr))
        .route("/batch", post(handlers::batch_process))
        .route("/validate", post(handlers::validate_answers))
        .route("/model-info", get(handlers::model_info));

    let protected = if settings.rate_limit.enabled {
        let limiter = build_limiter(
            settings.rate_limit.requests_per_second,
            settings.rate_limit.burst_size,
        );
        protected.layer(from_fn_with_state(limiter, rate_limit))
    } else {
        protected
    };

    let protected = if settings.auth.enabled {
        info!(keys = settings.auth.api_keys.len(), "API key authentication enabled");
        let keys = Arc::new(ApiKeys::new(settings.auth.api_keys.clone()));
        protected.layer(from_fn_with_state(keys, require_api_key))
    } else {
        protected
    };

    let api = Router::new()
        .route("/health", get(handlers::health_check))
        .merge(protected);

    Router::new()
        .route("/", get(handlers::index))
        .merge(SwaggerUi::new("/api/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api)
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::max(settings.upload.max_request_size))
        .layer(TimeoutLayer::new(Duration::from_secs(
            settings.server.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&settings.cors))
}
