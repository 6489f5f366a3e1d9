//! Periodic health probing of the active processor

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::processor::OmrProcessor;

/// Background task that keeps endpoint health up to date
pub struct HealthMonitor {
    handle: JoinHandle<()>,
}

impl HealthMonitor {
    /// Start probing `processor` every `interval_secs` (minimum one second)
    pub fn start(processor: Arc<dyn OmrProcessor>, interval_secs: u64) -> Self {
        let period = Duration::from_secs(interval_secs.max(1));
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if processor.health_check().await {
                    debug!(processor = %processor.name(), "Inference workers healthy");
                } else {
                    warn!(processor = %processor.name(), "No inference worker passed the health check");
                }
            }
        });
        Self { handle }
    }

    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
