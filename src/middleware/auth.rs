//! API key authentication

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

use crate::error::AppError;

/// Header accepted as an alternative to `Authorization: Bearer`
pub const API_KEY_HEADER: &str = "x-api-key";

/// Set of keys allowed to call protected routes
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    keys: HashSet<String>,
}

impl ApiKeys {
    pub fn new<I: IntoIterator<Item = String>>(keys: I) -> Self {
        Self {
            keys: keys.into_iter().filter(|k| !k.is_empty()).collect(),
        }
    }

    /// Check the request headers for a known key
    pub fn validate(&self, headers: &HeaderMap) -> Result<(), AppError> {
        let presented = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .or_else(|| headers.get(API_KEY_HEADER).and_then(|h| h.to_str().ok()));

        match presented {
            Some(key) if self.keys.contains(key.trim()) => Ok(()),
            _ => Err(AppError::Unauthorized),
        }
    }
}

/// Reject requests that do not carry a configured API key
pub async fn require_api_key(
    State(keys): State<Arc<ApiKeys>>,
    request: Request,
    next: Next,
) -> Response {
    match keys.validate(request.headers()) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            let client_ip = request
                .headers()
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .unwrap_or("unknown");
            warn!(path = %request.uri().path(), client_ip = %client_ip, "Rejected request without valid API key");
            e.into_response()
        }
    }
}
