//! Processor that forwards sheets to HTTP inference workers

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use crate::config::{InferenceConfig, ModelConfig};
use crate::error::{AppError, Result};
use crate::model::ModelWeights;
use crate::processor::traits::{OmrProcessor, OmrResult, ProcessorStatus};
use crate::upload::{ImageFormat, SheetImage};

/// Consecutive failures before an endpoint is taken out of rotation
const UNHEALTHY_THRESHOLD: u32 = 3;

/// Body of `POST {endpoint}/infer`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferRequest {
    /// Base64 encoded image bytes
    pub image: String,
    pub filename: String,
    pub format: ImageFormat,
    pub model_path: String,
    pub debug: bool,
}

/// Body of `GET {endpoint}/model-info`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerModelInfo {
    pub names: BTreeMap<u32, String>,
}

/// Inference endpoint status
#[derive(Debug, Clone)]
pub struct WorkerEndpoint {
    pub url: String,
    pub healthy: bool,
    pub last_check: Option<Instant>,
    pub consecutive_failures: u32,
}

impl WorkerEndpoint {
    pub fn new(url: String) -> Self {
        Self {
            url,
            healthy: true,
            last_check: None,
            consecutive_failures: 0,
        }
    }

    pub fn mark_healthy(&mut self) {
        self.healthy = true;
        self.last_check = Some(Instant::now());
        self.consecutive_failures = 0;
    }

    pub fn mark_unhealthy(&mut self) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= UNHEALTHY_THRESHOLD {
            self.healthy = false;
        }
        self.last_check = Some(Instant::now());
    }
}

/// Round-robin client for one or more inference workers
pub struct HttpProcessor {
    name: String,
    client: Client,
    endpoints: Arc<RwLock<Vec<WorkerEndpoint>>>,
    next_endpoint: AtomicUsize,
    health_check_path: String,
    model_path: String,
    configured_classes: Vec<String>,
}

impl HttpProcessor {
    /// Create a processor for the given workers, serving the given weights
    pub fn new(
        inference: &InferenceConfig,
        model: &ModelConfig,
        weights: &ModelWeights,
    ) -> Result<Self> {
        if inference.endpoints.is_empty() {
            return Err(AppError::Config(config::ConfigError::Message(
                "At least one inference endpoint is required".to_string(),
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(inference.timeout_ms))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let endpoints = inference
            .endpoints
            .iter()
            .map(|url| WorkerEndpoint::new(url.trim_end_matches('/').to_string()))
            .collect();

        Ok(Self {
            name: "http-inference".to_string(),
            client,
            endpoints: Arc::new(RwLock::new(endpoints)),
            next_endpoint: AtomicUsize::new(0),
            health_check_path: inference.health_check_path.clone(),
            model_path: weights.path.display().to_string(),
            configured_classes: model.classes.clone(),
        })
    }

    /// Get the next healthy endpoint
    fn get_next_endpoint(&self) -> Option<String> {
        let endpoints = self.endpoints.read();
        let healthy: Vec<&WorkerEndpoint> = endpoints.iter().filter(|e| e.healthy).collect();
        if healthy.is_empty() {
            return None;
        }

        let index = self.next_endpoint.fetch_add(1, Ordering::Relaxed) % healthy.len();
        Some(healthy[index].url.clone())
    }

    fn mark_endpoint_healthy(&self, url: &str) {
        let mut endpoints = self.endpoints.write();
        if let Some(endpoint) = endpoints.iter_mut().find(|e| e.url == url) {
            endpoint.mark_healthy();
            debug!(processor = %self.name, url = %url, "Marked endpoint as healthy");
        }
    }

    fn mark_endpoint_unhealthy(&self, url: &str) {
        let mut endpoints = self.endpoints.write();
        if let Some(endpoint) = endpoints.iter_mut().find(|e| e.url == url) {
            endpoint.mark_unhealthy();
            warn!(
                processor = %self.name,
                url = %url,
                failures = endpoint.consecutive_failures,
                "Inference endpoint failure"
            );
        }
    }

    fn fallback_classes(&self) -> BTreeMap<u32, String> {
        self.configured_classes
            .iter()
            .enumerate()
            .map(|(i, name)| (i as u32, name.clone()))
            .collect()
    }
}

#[async_trait]
impl OmrProcessor for HttpProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, image: SheetImage) -> Result<OmrResult> {
        let endpoint = self
            .get_next_endpoint()
            .ok_or_else(|| AppError::NoHealthyEndpoints(self.name.clone()))?;

        debug!(
            processor = %self.name,
            endpoint = %endpoint,
            filename = %image.filename,
            bytes = image.len(),
            "Sending sheet for inference"
        );

        let request = InferRequest {
            image: STANDARD.encode(&image.bytes),
            filename: image.filename,
            format: image.format,
            model_path: self.model_path.clone(),
            debug: false,
        };

        let response = self
            .client
            .post(format!("{}/infer", endpoint))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                self.mark_endpoint_unhealthy(&endpoint);
                AppError::HttpClient(e)
            })?;

        let status = response.status();
        if status.is_success() {
            let result = response.json::<OmrResult>().await.map_err(|e| {
                error!(processor = %self.name, error = %e, "Failed to parse inference response");
                AppError::Processing(format!("Failed to parse inference response: {}", e))
            })?;
            self.mark_endpoint_healthy(&endpoint);
            Ok(result)
        } else {
            let body = response.text().await.unwrap_or_default();
            if status.is_server_error() {
                self.mark_endpoint_unhealthy(&endpoint);
            }
            Err(AppError::Processing(format!(
                "Inference worker returned {}: {}",
                status, body
            )))
        }
    }

    async fn model_classes(&self) -> Result<BTreeMap<u32, String>> {
        let Some(endpoint) = self.get_next_endpoint() else {
            return Ok(self.fallback_classes());
        };

        let response = self
            .client
            .get(format!("{}/model-info", endpoint))
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                match response.json::<WorkerModelInfo>().await {
                    Ok(info) => Ok(info.names),
                    Err(e) => {
                        warn!(processor = %self.name, error = %e, "Unreadable model info, using configured classes");
                        Ok(self.fallback_classes())
                    }
                }
            }
            Ok(response) => {
                debug!(processor = %self.name, status = %response.status(), "Worker has no model info, using configured classes");
                Ok(self.fallback_classes())
            }
            Err(e) => {
                self.mark_endpoint_unhealthy(&endpoint);
                warn!(processor = %self.name, error = %e, "Model info request failed, using configured classes");
                Ok(self.fallback_classes())
            }
        }
    }

    async fn health_check(&self) -> bool {
        let endpoints = self.endpoints.read().clone();
        let mut any_healthy = false;

        for endpoint in &endpoints {
            let url = format!("{}{}", endpoint.url, self.health_check_path);
            match self.client.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    self.mark_endpoint_healthy(&endpoint.url);
                    any_healthy = true;
                    debug!(processor = %self.name, endpoint = %endpoint.url, "Health check passed");
                }
                Ok(response) => {
                    self.mark_endpoint_unhealthy(&endpoint.url);
                    debug!(
                        processor = %self.name,
                        endpoint = %endpoint.url,
                        status = %response.status(),
                        "Health check failed"
                    );
                }
                Err(e) => {
                    self.mark_endpoint_unhealthy(&endpoint.url);
                    debug!(
                        processor = %self.name,
                        endpoint = %endpoint.url,
                        error = %e,
                        "Health check failed"
                    );
                }
            }
        }

        any_healthy
    }

    fn status(&self) -> ProcessorStatus {
        let endpoints = self.endpoints.read();
        ProcessorStatus {
            name: self.name.clone(),
            endpoints: endpoints.iter().map(|e| e.url.clone()).collect(),
            healthy_endpoints: endpoints.iter().filter(|e| e.healthy).count(),
        }
    }
}
