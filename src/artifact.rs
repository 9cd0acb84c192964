//! Artifact retriever

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::info;

use crate::client::VideoService;
use crate::error::{ClientError, Result};

/// Processed video as returned by the service. The bytes are passed through untouched.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub task_id: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub suggested_filename: String,
}

impl Artifact {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Write the artifact into `dir` under its suggested name
    pub async fn save_to(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir).await?;
        let path = dir.join(&self.suggested_filename);
        fs::write(&path, &self.bytes).await?;
        info!("💾 Saved {} bytes to {}", self.bytes.len(), path.display());
        Ok(path)
    }
}

/// File extension for an artifact media type
pub fn extension_for(content_type: Option<&str>) -> &'static str {
    let essence = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default();
    match essence.as_str() {
        "video/webm" => "webm",
        "video/x-msvideo" | "video/avi" => "avi",
        "video/quicktime" => "mov",
        "video/x-matroska" => "mkv",
        _ => "mp4",
    }
}

/// `processed_video_<taskId>.<ext>`
pub fn suggested_filename(task_id: &str, content_type: Option<&str>) -> String {
    let safe_id: String = task_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("processed_video_{}.{}", safe_id, extension_for(content_type))
}

pub struct ArtifactRetriever {
    service: Arc<dyn VideoService>,
}

impl ArtifactRetriever {
    pub fn new(service: Arc<dyn VideoService>) -> Self {
        Self { service }
    }

    pub async fn retrieve(&self, task_id: &str) -> Result<Artifact> {
        info!("📥 Downloading artifact for task {}", task_id);
        let response = self
            .service
            .download(task_id)
            .await
            .map_err(ClientError::DownloadFailed)?;

        let suggested_filename = suggested_filename(task_id, response.content_type.as_deref());
        Ok(Artifact {
            task_id: task_id.to_string(),
            bytes: response.bytes,
            content_type: response.content_type,
            suggested_filename,
        })
    }
}
