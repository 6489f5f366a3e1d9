//! Processor module - inference trait, HTTP worker client and health monitor

pub mod health;
pub mod http_processor;
pub mod traits;

pub use health::HealthMonitor;
pub use http_processor::HttpProcessor;
pub use traits::{OmrProcessor, OmrResult, ProcessorStatus};
