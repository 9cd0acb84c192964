//! Upload coordinator
//!
//! Turns a selected local video into a server-issued file id with a single
//! multipart upload. No retries: a failed upload is retried by calling again.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::client::{UploadPayload, VideoService};
use crate::config::UploadConfig;
use crate::error::{CallError, ClientError, Result, ValidationError};

/// A locally selected file and, once uploaded, its remote id
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    path: PathBuf,
    file_id: Option<String>,
    selected_at: DateTime<Utc>,
}

impl UploadedFile {
    /// Select a file; it has no remote id until uploaded
    pub fn select(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file_id: None,
            selected_at: Utc::now(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "video".to_string())
    }

    pub fn file_id(&self) -> Option<&str> {
        self.file_id.as_deref()
    }

    pub fn is_uploaded(&self) -> bool {
        self.file_id.is_some()
    }

    pub fn selected_at(&self) -> DateTime<Utc> {
        self.selected_at
    }

    pub(crate) fn mark_uploaded(&mut self, file_id: String) {
        self.file_id = Some(file_id);
    }
}

/// Media type sent with the multipart part, from the file extension
pub fn media_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" => "video/mp4",
        "m4v" => "video/x-m4v",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "flv" => "video/x-flv",
        _ => "application/octet-stream",
    }
}

pub struct UploadCoordinator {
    service: Arc<dyn VideoService>,
    config: UploadConfig,
}

impl UploadCoordinator {
    pub fn new(service: Arc<dyn VideoService>, config: UploadConfig) -> Self {
        Self { service, config }
    }

    /// Local checks and file read; nothing is sent
    pub async fn prepare(&self, file: &UploadedFile) -> Result<UploadPayload> {
        let path = file.path();
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => return Err(ValidationError::FileNotFound(path.to_path_buf()).into()),
        };

        if self.config.max_file_size > 0 && metadata.len() > self.config.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size: metadata.len(),
                limit: self.config.max_file_size,
            }
            .into());
        }

        if !self.is_video(path) {
            warn!("{} does not look like a video file; uploading anyway", path.display());
        }

        let bytes = tokio::fs::read(path).await?;
        Ok(UploadPayload {
            file_name: file.file_name(),
            media_type: media_type_for(path).to_string(),
            bytes,
        })
    }

    /// Upload the file and return the server-issued id
    pub async fn upload(&self, file: &UploadedFile) -> Result<String> {
        let payload = self.prepare(file).await?;
        let size = payload.bytes.len();
        info!("📤 Uploading {} ({} bytes)", payload.file_name, size);

        let response = self
            .service
            .upload(payload)
            .await
            .map_err(ClientError::UploadFailed)?;

        let file_id = response.file_id.trim().to_string();
        if file_id.is_empty() {
            return Err(ClientError::UploadFailed(CallError::Decode(
                "service returned an empty file id".to_string(),
            )));
        }

        info!("✅ Upload complete, file id {}", file_id);
        Ok(file_id)
    }

    fn is_video(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .map_or(false, |ext| self.config.video_extensions.iter().any(|v| v.eq_ignore_ascii_case(&ext)))
    }
}
