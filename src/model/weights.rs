//! Local model weights

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{AppError, Result};

/// A verified weights file on local disk
#[derive(Debug, Clone)]
pub struct ModelWeights {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub loaded_at: DateTime<Utc>,
}

impl ModelWeights {
    /// Verify the weights file exists, is a regular file and is not empty
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            AppError::ModelWeights(format!("{}: {}", path.display(), e))
        })?;

        if !metadata.is_file() {
            return Err(AppError::ModelWeights(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        if metadata.len() == 0 {
            return Err(AppError::ModelWeights(format!("{} is empty", path.display())));
        }

        let weights = Self {
            path: path.to_path_buf(),
            size_bytes: metadata.len(),
            loaded_at: Utc::now(),
        };
        info!(
            path = %weights.path.display(),
            size_bytes = weights.size_bytes,
            "Model weights loaded"
        );
        Ok(weights)
    }

    pub fn size_mb(&self) -> f64 {
        bytes_to_mb(self.size_bytes)
    }
}

pub(crate) fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}
