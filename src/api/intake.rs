//! Extracting sheet images from multipart and JSON requests

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
};
use serde_json::Value;
use tracing::debug;

use crate::config::UploadConfig;
use crate::error::{AppError, Result};
use crate::upload::{allowed_file, decode_base64_image, secure_filename, ImageFormat, SheetImage};

/// Multipart field names accepted for batch uploads
pub const BATCH_FIELDS: &[&str] = &["files[]", "files"];

/// Body encodings the image routes understand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Multipart,
    Json,
    Other,
}

pub fn body_kind(request: &Request) -> BodyKind {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase())
        .unwrap_or_default();

    if content_type.starts_with("multipart/form-data") {
        BodyKind::Multipart
    } else if content_type.starts_with("application/json") || content_type.contains("+json") {
        BodyKind::Json
    } else {
        BodyKind::Other
    }
}

/// A file part as received, before validation
#[derive(Debug, Clone)]
pub struct RawUpload {
    pub filename: String,
    pub bytes: Bytes,
}

/// Validate a received file part and turn it into a sheet image
pub fn validate_upload(upload: RawUpload, limits: &UploadConfig) -> Result<SheetImage> {
    if upload.filename.is_empty() {
        return Err(AppError::EmptyFilename);
    }
    if !allowed_file(&upload.filename, &limits.allowed_extensions) {
        return Err(AppError::InvalidFileType {
            allowed_types: limits.allowed_extensions.clone(),
        });
    }
    if upload.bytes.len() > limits.max_file_size {
        return Err(AppError::FileTooLarge {
            limit: limits.max_file_size,
        });
    }
    let format = ImageFormat::sniff(&upload.bytes).ok_or_else(|| AppError::InvalidFileType {
        allowed_types: limits.allowed_extensions.clone(),
    })?;

    Ok(SheetImage::new(
        secure_filename(&upload.filename),
        format,
        upload.bytes,
    ))
}

/// Read the single sheet sent to `/api/process`
pub async fn read_single_image(request: Request, limits: &UploadConfig) -> Result<SheetImage> {
    match body_kind(&request) {
        BodyKind::Multipart => {
            let mut multipart = open_multipart(request).await?;
            while let Some(field) = multipart.next_field().await? {
                if field.name() != Some("file") {
                    continue;
                }
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                debug!(filename = %filename, bytes = bytes.len(), "Received multipart upload");
                return validate_upload(RawUpload { filename, bytes }, limits);
            }
            Err(AppError::NoImage)
        }
        BodyKind::Json => {
            let body = read_json(request, limits.max_request_size).await?;
            let encoded = body
                .get("image")
                .ok_or(AppError::NoImage)?
                .as_str()
                .ok_or(AppError::InvalidBase64Image)?;
            let (format, bytes) = decode_base64_image(encoded)?;
            if bytes.len() > limits.max_file_size {
                return Err(AppError::FileTooLarge {
                    limit: limits.max_file_size,
                });
            }
            debug!(format = %format, bytes = bytes.len(), "Received base64 upload");
            Ok(SheetImage::new(
                format!("base64_image.{}", format.extension()),
                format,
                Bytes::from(bytes),
            ))
        }
        BodyKind::Other => Err(AppError::NoImage),
    }
}

/// Collect every file part of a batch upload, unvalidated and in order
pub async fn read_batch_uploads(request: Request) -> Result<Vec<RawUpload>> {
    if body_kind(&request) != BodyKind::Multipart {
        return Err(AppError::NoFiles);
    }

    let mut multipart = open_multipart(request).await?;
    let mut uploads = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let is_file = field.name().map_or(false, |name| BATCH_FIELDS.contains(&name));
        if !is_file {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        uploads.push(RawUpload { filename, bytes });
    }
    Ok(uploads)
}

/// Read a JSON body into a value
pub async fn read_json(request: Request, limit: usize) -> Result<Value> {
    let bytes = axum::body::to_bytes(request.into_body(), limit)
        .await
        .map_err(|_| AppError::FileTooLarge { limit })?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AppError::InvalidRequest(format!("Malformed JSON body: {}", e)))
}

async fn open_multipart(request: Request) -> Result<Multipart> {
    Multipart::from_request(request, &())
        .await
        .map_err(|rejection| AppError::InvalidRequest(rejection.body_text()))
}
