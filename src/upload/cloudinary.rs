//! Multipart upload to Cloudinary.
//!
//! The file body is streamed in chunks; each chunk handed to the HTTP client
//! is reported as transferred bytes through the [`ProgressSink`].

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use super::{MediaFile, ProgressSink};
use crate::config::EndpointConfig;
use crate::error::UploadError;

/// Chunk size used when streaming the file body.
const UPLOAD_CHUNK_BYTES: usize = 256 * 1024;

/// Remote store that turns a local file into a durable URL.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Transfer `file`, reporting progress to `progress`. Returns the durable URL.
    async fn upload(&self, file: &MediaFile, progress: ProgressSink) -> Result<String, UploadError>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

/// Cloudinary unsigned upload endpoint.
pub struct CloudinaryStore {
    client: reqwest::Client,
    upload_url: String,
    upload_preset: String,
}

impl CloudinaryStore {
    pub fn new(upload_url: impl Into<String>, upload_preset: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            upload_url: upload_url.into(),
            upload_preset: upload_preset.into(),
        }
    }

    pub fn from_config(config: &EndpointConfig) -> Self {
        Self::new(
            config.cloudinary_upload_url(),
            config.cloudinary_upload_preset.clone(),
        )
    }
}

fn transfer_failed(reason: impl Into<String>) -> UploadError {
    UploadError::TransferFailed {
        reason: reason.into(),
    }
}

#[async_trait]
impl ObjectStore for CloudinaryStore {
    async fn upload(&self, file: &MediaFile, progress: ProgressSink) -> Result<String, UploadError> {
        let total = file.size();
        let data = Arc::clone(file.bytes());
        let ranges: Vec<_> = (0..data.len())
            .step_by(UPLOAD_CHUNK_BYTES)
            .map(|start| start..(start + UPLOAD_CHUNK_BYTES).min(data.len()))
            .collect();

        let mut sent = 0u64;
        let body = futures::stream::iter(ranges).map(move |range| {
            let chunk = data[range].to_vec();
            sent += chunk.len() as u64;
            progress.report(sent, total);
            Ok::<_, std::io::Error>(chunk)
        });

        let part = Part::stream_with_length(reqwest::Body::wrap_stream(body), total)
            .file_name(file.name().to_string())
            .mime_str(file.mime())
            .map_err(|e| transfer_failed(format!("invalid mime type: {e}")))?;
        let form = Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone());

        let resp = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| transfer_failed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status = ?status, "Object store rejected upload");
            return Err(transfer_failed(format!("upload returned {status}: {body}")));
        }

        let parsed: UploadResponse = resp
            .json()
            .await
            .map_err(|e| transfer_failed(format!("unreadable upload response: {e}")))?;
        Ok(parsed.secure_url)
    }
}
