//! Fetch model weights from remote storage before the server starts

use futures::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::config::ModelConfig;
use crate::error::{AppError, Result};
use crate::model::weights::bytes_to_mb;

/// What `ensure_model` ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Weights were already on disk; nothing was fetched
    AlreadyPresent { size_bytes: u64 },
    /// Weights were fetched from the configured URL
    Downloaded { size_bytes: u64 },
    /// No URL configured and no weights on disk
    NotConfigured,
}

impl DownloadOutcome {
    /// Whether usable weights are on disk afterwards
    pub fn is_available(&self) -> bool {
        !matches!(self, DownloadOutcome::NotConfigured)
    }
}

/// Downloads model weights with retries and progress logging
pub struct ModelDownloader {
    client: Client,
    retries: u32,
    retry_backoff: Duration,
}

impl ModelDownloader {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.download_timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            retries: config.download_retries,
            retry_backoff: Duration::from_secs(2),
        })
    }

    /// Override the delay between attempts; attempt `n` waits `n * backoff`
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Make sure weights exist at `path`, downloading from `url` if needed
    pub async fn ensure_model(&self, path: &Path, url: &str) -> Result<DownloadOutcome> {
        if let Ok(metadata) = tokio::fs::metadata(path).await {
            if metadata.is_file() {
                info!(
                    path = %path.display(),
                    size_bytes = metadata.len(),
                    "Model already exists, skipping download"
                );
                return Ok(DownloadOutcome::AlreadyPresent {
                    size_bytes: metadata.len(),
                });
            }
        }

        if url.trim().is_empty() {
            warn!(
                path = %path.display(),
                "MODEL_URL is not set and no weights are on disk; set MODEL_URL to a direct download link for the weights file"
            );
            return Ok(DownloadOutcome::NotConfigured);
        }

        let attempts = self.retries + 1;
        let mut last_error = None;
        for attempt in 1..=attempts {
            match self.download(url, path).await {
                Ok(size_bytes) => {
                    info!(
                        path = %path.display(),
                        size_mb = bytes_to_mb(size_bytes),
                        "Model download complete"
                    );
                    return Ok(DownloadOutcome::Downloaded { size_bytes });
                }
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "Model download attempt failed");
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(self.retry_backoff * attempt).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AppError::Download("no attempts made".to_string())))
    }

    /// Stream `url` into `<path>.part`, then move it into place
    async fn download(&self, url: &str, path: &Path) -> Result<u64> {
        info!(url = %url, destination = %path.display(), "Downloading model");

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let partial = partial_path(path);
        let result = match self.stream_to(url, &partial).await {
            Ok(written) => tokio::fs::rename(&partial, path)
                .await
                .map(|_| written)
                .map_err(AppError::from),
            Err(e) => Err(e),
        };
        if result.is_err() {
            let _ = tokio::fs::remove_file(&partial).await;
        }
        result
    }

    async fn stream_to(&self, url: &str, destination: &Path) -> Result<u64> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::Download(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Download(format!("server returned {}", status)));
        }

        let total = response.content_length().filter(|len| *len > 0);
        let mut file = tokio::fs::File::create(destination).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        let mut progress = Progress::new(total);

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| AppError::Download(e.to_string()))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            if let Some(percent) = progress.advance(written) {
                info!(percent, downloaded_bytes = written, "Download progress");
            }
        }
        file.flush().await?;

        if written == 0 {
            return Err(AppError::Download("server returned an empty body".to_string()));
        }
        if let Some(expected) = total {
            if written != expected {
                return Err(AppError::Download(format!(
                    "truncated download: {} of {} bytes",
                    written, expected
                )));
            }
        }

        Ok(written)
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

/// Reports each 10% step once when the total size is known
struct Progress {
    total: Option<u64>,
    last_step: u64,
}

impl Progress {
    fn new(total: Option<u64>) -> Self {
        Self { total, last_step: 0 }
    }

    fn advance(&mut self, written: u64) -> Option<u64> {
        let total = self.total?;
        let step = (written.min(total) * 10 / total) * 10;
        if step > self.last_step {
            self.last_step = step;
            Some(step)
        } else {
            None
        }
    }
}
