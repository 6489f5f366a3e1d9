//! Application settings and configuration management

use crate::error::{AppError, Result};
use crate::grading::AnswerKey;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Named answer keys, usually loaded from `config/answer_keys.yaml`
    #[serde(default)]
    pub answer_keys: BTreeMap<String, AnswerKey>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// API key authentication. Enabled implicitly once a key is configured.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub api_keys: Vec<String>,
}

/// Cross-origin configuration; `*` allows every origin
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
    #[serde(default = "default_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_origins() -> Vec<String> {
    vec!["*".to_string()]
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_origins(),
        }
    }
}

impl CorsConfig {
    pub fn allows_any(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_rps")]
    pub requests_per_second: u32,
    #[serde(default = "default_burst")]
    pub burst_size: u32,
}

fn default_rps() -> u32 {
    10
}

fn default_burst() -> u32 {
    20
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_second: default_rps(),
            burst_size: default_burst(),
        }
    }
}

/// Model weights and metadata
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_path")]
    pub path: String,
    /// Remote location of the weights; empty disables downloading
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_model_type")]
    pub model_type: String,
    #[serde(default = "default_input_size")]
    pub input_size: String,
    /// Class names used when the inference worker cannot report its own
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default = "default_true")]
    pub download_on_startup: bool,
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
    #[serde(default = "default_download_retries")]
    pub download_retries: u32,
}

fn default_model_path() -> String {
    "best.pt".to_string()
}

fn default_model_type() -> String {
    "YOLOv8".to_string()
}

fn default_input_size() -> String {
    "640x640".to_string()
}

fn default_true() -> bool {
    true
}

fn default_download_timeout() -> u64 {
    600
}

fn default_download_retries() -> u32 {
    2
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
            url: String::new(),
            model_type: default_model_type(),
            input_size: default_input_size(),
            classes: vec![],
            download_on_startup: true,
            download_timeout_secs: default_download_timeout(),
            download_retries: default_download_retries(),
        }
    }
}

/// Inference worker configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InferenceConfig {
    #[serde(default = "default_inference_endpoints")]
    pub endpoints: Vec<String>,
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    #[serde(default = "default_health_check_path")]
    pub health_check_path: String,
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_secs: u64,
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,
}

fn default_inference_endpoints() -> Vec<String> {
    vec!["http://127.0.0.1:8001".to_string()]
}

fn default_timeout() -> u64 {
    60000
}

fn default_health_check_path() -> String {
    "/health".to_string()
}

fn default_health_check_interval() -> u64 {
    30
}

fn default_batch_concurrency() -> usize {
    4
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoints: default_inference_endpoints(),
            timeout_ms: default_timeout(),
            health_check_path: default_health_check_path(),
            health_check_interval_secs: default_health_check_interval(),
            batch_concurrency: default_batch_concurrency(),
        }
    }
}

/// Upload limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,
    #[serde(default = "default_max_request_size")]
    pub max_request_size: usize,
    #[serde(default = "default_max_batch_files")]
    pub max_batch_files: usize,
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

fn default_max_file_size() -> usize {
    10 * 1024 * 1024
}

fn default_max_request_size() -> usize {
    64 * 1024 * 1024
}

fn default_max_batch_files() -> usize {
    50
}

fn default_allowed_extensions() -> Vec<String> {
    ["png", "jpg", "jpeg", "bmp", "tiff"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            max_request_size: default_max_request_size(),
            max_batch_files: default_max_batch_files(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Answer key file structure
#[derive(Debug, Clone, Deserialize, Default)]
struct AnswerKeysFile {
    #[serde(default)]
    answer_keys: BTreeMap<String, serde_yaml::Mapping>,
}

impl Settings {
    /// Load settings from the default file locations and the process environment
    pub fn load() -> Result<Self> {
        Self::load_from_paths("config/omr-api.yaml", Some("config/answer_keys.yaml"))
    }

    /// Load settings from a configuration file plus an optional answer key file
    pub fn load_from_paths<P: AsRef<Path>>(
        settings_file: P,
        answer_keys_file: Option<P>,
    ) -> Result<Self> {
        let settings_path = settings_file.as_ref();

        let format = if settings_path
            .extension()
            .map_or(false, |ext| ext == "yaml" || ext == "yml")
        {
            FileFormat::Yaml
        } else {
            FileFormat::Toml
        };

        let mut builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", i64::from(default_port()))?
            .set_default("model.path", default_model_path())?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.format", default_log_format())?;

        if settings_path.exists() {
            builder = builder.add_source(File::from(settings_path).format(format));
        }

        builder = builder.add_source(
            Environment::with_prefix("OMR_API")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("auth.api_keys")
                .with_list_parse_key("cors.allowed_origins")
                .with_list_parse_key("inference.endpoints")
                .with_list_parse_key("model.classes")
                .with_list_parse_key("upload.allowed_extensions"),
        );

        let mut settings: Settings = builder.build()?.try_deserialize()?;
        settings.apply_platform_env(|name| std::env::var(name).ok());

        if let Some(path) = answer_keys_file {
            let path = path.as_ref();
            if path.exists() {
                settings.answer_keys.extend(Self::load_answer_keys(path)?);
            }
        }

        settings.finalize();
        Ok(settings)
    }

    /// Apply the plain variables hosting platforms inject (`PORT`, `MODEL_PATH`, ...)
    pub fn apply_platform_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(port) = non_empty("PORT").and_then(|p| p.trim().parse().ok()) {
            self.server.port = port;
        }
        if let Some(path) = non_empty("MODEL_PATH") {
            self.model.path = path;
        }
        if let Some(url) = non_empty("MODEL_URL") {
            self.model.url = url;
        }
        if let Some(key) = non_empty("API_KEY") {
            self.auth.api_keys.push(key);
        }
        if let Some(origins) = non_empty("CORS_ORIGINS") {
            self.cors.allowed_origins = split_list(&origins);
        }
        if let Some(endpoints) = non_empty("INFERENCE_URL") {
            self.inference.endpoints = split_list(&endpoints);
        }
    }

    /// Normalise derived fields once all sources have been merged
    pub fn finalize(&mut self) {
        self.auth.api_keys.retain(|k| !k.is_empty());
        self.auth.api_keys.dedup();
        if !self.auth.api_keys.is_empty() {
            self.auth.enabled = true;
        }
        for ext in &mut self.upload.allowed_extensions {
            *ext = ext.trim_start_matches('.').to_lowercase();
        }
    }

    /// Load named answer keys from a YAML file
    pub fn load_answer_keys<P: AsRef<Path>>(path: P) -> Result<BTreeMap<String, AnswerKey>> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            AppError::Config(config::ConfigError::Message(format!(
                "Failed to read answer keys: {}",
                e
            )))
        })?;
        Self::parse_answer_keys(&content)
    }

    /// Parse answer keys; integer question numbers are accepted and stringified
    pub fn parse_answer_keys(content: &str) -> Result<BTreeMap<String, AnswerKey>> {
        let file: AnswerKeysFile = serde_yaml::from_str(content).map_err(|e| {
            AppError::Config(config::ConfigError::Message(format!(
                "Failed to parse answer keys: {}",
                e
            )))
        })?;

        let mut keys = BTreeMap::new();
        for (name, mapping) in file.answer_keys {
            let mut key = AnswerKey::new();
            for (question, answer) in mapping {
                let question = yaml_key_to_string(&question).ok_or_else(|| {
                    AppError::Config(config::ConfigError::Message(format!(
                        "Answer key '{}' has a non-scalar question id",
                        name
                    )))
                })?;
                let answer = serde_json::to_value(&answer).map_err(|e| {
                    AppError::Config(config::ConfigError::Message(format!(
                        "Answer key '{}' question '{}': {}",
                        name, question, e
                    )))
                })?;
                key.insert(question, answer);
            }
            keys.insert(name, key);
        }
        Ok(keys)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(config_error("Server port cannot be 0"));
        }
        if self.auth.enabled && self.auth.api_keys.is_empty() {
            return Err(config_error(
                "auth.enabled requires at least one key in auth.api_keys or API_KEY",
            ));
        }
        if self.upload.allowed_extensions.is_empty() {
            return Err(config_error("At least one image extension must be allowed"));
        }
        if self.upload.max_file_size == 0 || self.upload.max_request_size == 0 {
            return Err(config_error("Upload size limits must be positive"));
        }
        if self.upload.max_request_size < self.upload.max_file_size {
            return Err(config_error(
                "upload.max_request_size must be at least upload.max_file_size",
            ));
        }
        if self.upload.max_batch_files == 0 || self.inference.batch_concurrency == 0 {
            return Err(config_error("Batch limits must be positive"));
        }
        if self.rate_limit.enabled
            && (self.rate_limit.requests_per_second == 0 || self.rate_limit.burst_size == 0)
        {
            return Err(config_error("Rate limit values must be positive"));
        }
        for endpoint in &self.inference.endpoints {
            if reqwest::Url::parse(endpoint).is_err() {
                return Err(config_error(&format!(
                    "Invalid inference endpoint URL: {}",
                    endpoint
                )));
            }
        }
        for (name, key) in &self.answer_keys {
            if key.is_empty() {
                return Err(config_error(&format!("Answer key '{}' is empty", name)));
            }
        }
        Ok(())
    }
}

fn config_error(message: &str) -> AppError {
    AppError::Config(config::ConfigError::Message(message.to_string()))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn yaml_key_to_string(key: &serde_yaml::Value) -> Option<String> {
    match key {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            cors: CorsConfig::default(),
            rate_limit: RateLimitConfig::default(),
            model: ModelConfig::default(),
            inference: InferenceConfig::default(),
            upload: UploadConfig::default(),
            logging: LoggingConfig::default(),
            answer_keys: BTreeMap::new(),
        }
    }
}
