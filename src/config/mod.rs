//! Configuration module

pub mod settings;

pub use settings::{
    AuthConfig, CorsConfig, InferenceConfig, LoggingConfig, ModelConfig, RateLimitConfig,
    ServerConfig, Settings, UploadConfig,
};
