//! Model weights: on-disk verification and startup download

pub mod download;
pub mod weights;

pub use download::{DownloadOutcome, ModelDownloader};
pub use weights::ModelWeights;
