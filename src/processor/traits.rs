//! Processor trait and shared result types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::upload::SheetImage;

/// Output of OMR inference for one sheet.
///
/// Only `answers` has a fixed meaning; everything else the worker returns is
/// passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OmrResult {
    #[serde(default)]
    pub answers: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OmrResult {
    /// Error message embedded by the worker, if any
    pub fn error(&self) -> Option<String> {
        self.extra.get("error").map(|e| match e {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    pub fn questions_detected(&self) -> usize {
        self.answers.len()
    }

    /// The result as one JSON object, without the keys in `reserved`.
    ///
    /// Callers add their own values for those keys afterwards.
    pub fn to_map_without(&self, reserved: &[&str]) -> Map<String, Value> {
        let mut map = Map::with_capacity(self.extra.len() + 1);
        map.insert("answers".to_string(), Value::Object(self.answers.clone()));
        for (key, value) in &self.extra {
            if !reserved.contains(&key.as_str()) {
                map.insert(key.clone(), value.clone());
            }
        }
        map
    }
}

/// Processor status snapshot
#[derive(Debug, Clone)]
pub struct ProcessorStatus {
    pub name: String,
    pub endpoints: Vec<String>,
    pub healthy_endpoints: usize,
}

/// Trait for OMR inference processors
#[async_trait]
pub trait OmrProcessor: Send + Sync {
    /// Get the processor name
    fn name(&self) -> &str;

    /// Run OMR on a single sheet
    async fn process(&self, image: SheetImage) -> Result<OmrResult>;

    /// Class index → label for the loaded model
    async fn model_classes(&self) -> Result<BTreeMap<u32, String>>;

    /// Probe the processor; true when at least one worker answered
    async fn health_check(&self) -> bool;

    /// Current status without performing I/O
    fn status(&self) -> ProcessorStatus;
}
