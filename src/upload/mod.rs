//! Image intake: filename checks, format sniffing and base64 decoding

pub mod filename;
pub mod format;

pub use filename::{allowed_file, secure_filename};
pub use format::{decode_base64_image, ImageFormat};

use axum::body::Bytes;

/// An uploaded sheet held in memory until the worker has processed it
#[derive(Debug, Clone)]
pub struct SheetImage {
    /// Sanitised filename reported back to the client
    pub filename: String,
    pub format: ImageFormat,
    pub bytes: Bytes,
}

impl SheetImage {
    pub fn new(filename: String, format: ImageFormat, bytes: Bytes) -> Self {
        Self {
            filename,
            format,
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
