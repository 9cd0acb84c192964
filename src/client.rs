//! Transport seam to the remote video processing service

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::config::{Config, ServiceConfig, TransportConfig};
use crate::error::{CallError, ClientError, Result};
use crate::job::JobStatus;
use crate::request::{SubmissionRequest, SubmitEncoding};

/// File content ready to be sent to the upload endpoint
#[derive(Debug, Clone)]
pub struct UploadPayload {
    pub file_name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(rename = "fileId", alias = "file_id")]
    pub file_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    #[serde(rename = "taskId", alias = "task_id")]
    pub task_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    pub status: JobStatus,
    #[serde(default, rename = "progressPercent", alias = "progress")]
    pub progress_percent: Option<f64>,
    #[serde(default, rename = "framesProcessed", alias = "frame_count")]
    pub frames_processed: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl TaskStatusResponse {
    pub fn new(status: JobStatus) -> Self {
        Self {
            status,
            progress_percent: None,
            frames_processed: None,
            error: None,
            message: None,
        }
    }

    pub fn with_progress(mut self, percent: f64) -> Self {
        self.progress_percent = Some(percent);
        self
    }

    pub fn with_frames(mut self, frames: u64) -> Self {
        self.frames_processed = Some(frames);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Raw artifact body
#[derive(Debug, Clone)]
pub struct DownloadResponse {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Greeting returned by the service root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Operations offered by the remote service
#[async_trait]
pub trait VideoService: Send + Sync {
    async fn upload(&self, payload: UploadPayload) -> std::result::Result<UploadResponse, CallError>;
    async fn submit(&self, request: &SubmissionRequest) -> std::result::Result<SubmitResponse, CallError>;
    async fn task_status(&self, task_id: &str) -> std::result::Result<TaskStatusResponse, CallError>;
    async fn download(&self, task_id: &str) -> std::result::Result<DownloadResponse, CallError>;
    async fn service_info(&self) -> std::result::Result<ServiceInfo, CallError>;
}

/// `VideoService` over HTTP
pub struct HttpVideoService {
    service: ServiceConfig,
    transport: TransportConfig,
    base_url: Url,
    client: reqwest::Client,
}

impl HttpVideoService {
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = Url::parse(&config.service.base_url)
            .map_err(|e| ClientError::Config(format!("invalid base_url {}: {}", config.service.base_url, e)))?;

        let client = reqwest::Client::builder()
            .timeout(config.transport.request_timeout())
            .connect_timeout(config.transport.connect_timeout())
            .user_agent(config.transport.user_agent.clone())
            .build()
            .map_err(|e| ClientError::Config(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            service: config.service.clone(),
            transport: config.transport.clone(),
            base_url,
            client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> std::result::Result<Url, CallError> {
        let url = format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path);
        Url::parse(&url).map_err(|e| CallError::Transport(format!("invalid URL {}: {}", url, e)))
    }

    fn task_endpoint(&self, template: &str, task_id: &str) -> std::result::Result<Url, CallError> {
        let path = template.replace("{task_id}", &urlencoding::encode(task_id));
        self.endpoint(&path)
    }
}

#[async_trait]
impl VideoService for HttpVideoService {
    async fn upload(&self, payload: UploadPayload) -> std::result::Result<UploadResponse, CallError> {
        let url = self.endpoint(&self.service.upload_path)?;
        debug!("Uploading {} ({} bytes) to {}", payload.file_name, payload.bytes.len(), url);

        let part = reqwest::multipart::Part::bytes(payload.bytes)
            .file_name(payload.file_name)
            .mime_str(&payload.media_type)
            .map_err(|e| CallError::Transport(format!("invalid media type: {}", e)))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(url)
            .timeout(self.transport.upload_timeout())
            .multipart(form)
            .send()
            .await?;

        Ok(ensure_success(response).await?.json().await?)
    }

    async fn submit(&self, request: &SubmissionRequest) -> std::result::Result<SubmitResponse, CallError> {
        let url = self.endpoint(request.path())?;
        let style = self.service.key_style;
        debug!("Submitting {} job for file {} to {}", request.detection_type(), request.file_id(), url);

        let builder = self.client.post(url);
        let builder = match self.service.submit_encoding {
            SubmitEncoding::Query => builder.query(&request.query_pairs(style)),
            SubmitEncoding::Json => builder.json(&request.json_body(style)),
        };

        let response = builder.send().await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    async fn task_status(&self, task_id: &str) -> std::result::Result<TaskStatusResponse, CallError> {
        let url = self.task_endpoint(&self.service.status_path, task_id)?;
        debug!("Checking status at {}", url);

        let response = self.client.get(url).send().await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    async fn download(&self, task_id: &str) -> std::result::Result<DownloadResponse, CallError> {
        let url = self.task_endpoint(&self.service.download_path, task_id)?;
        debug!("Downloading artifact from {}", url);

        let response = ensure_success(self.client.get(url).send().await?).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());
        let bytes = response.bytes().await?.to_vec();

        Ok(DownloadResponse { bytes, content_type })
    }

    async fn service_info(&self) -> std::result::Result<ServiceInfo, CallError> {
        let url = self.endpoint("/")?;
        let response = self.client.get(url).send().await?;
        Ok(ensure_success(response).await?.json().await?)
    }
}

async fn ensure_success(response: reqwest::Response) -> std::result::Result<reqwest::Response, CallError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(error_from_body(status.as_u16(), &body))
}

/// Classify a non-2xx response. A JSON body carrying `detail`, `error` or
/// `message` is a service error; anything else is a transport failure.
pub fn error_from_body(status: u16, body: &str) -> CallError {
    let payload = serde_json::from_str::<serde_json::Value>(body).ok();
    let message = payload.as_ref().and_then(|value| {
        ["detail", "error", "message"].iter().find_map(|key| match value.get(*key) {
            Some(serde_json::Value::String(text)) => Some(text.clone()),
            Some(serde_json::Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        })
    });

    match message {
        Some(message) => CallError::Service { status, message },
        None if body.trim().is_empty() => CallError::Transport(format!("HTTP {}", status)),
        None => CallError::Transport(format!("HTTP {}: {}", status, body.trim())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_field_aliases() {
        let camel: UploadResponse = serde_json::from_str(r#"{"fileId": "abc123"}"#).unwrap();
        let snake: UploadResponse = serde_json::from_str(r#"{"file_id": "abc123", "message": "ok"}"#).unwrap();
        assert_eq!(camel.file_id, "abc123");
        assert_eq!(snake.file_id, "abc123");

        let submit: SubmitResponse = serde_json::from_str(r#"{"task_id": "t1", "message": "started"}"#).unwrap();
        assert_eq!(submit.task_id, "t1");

        let status: TaskStatusResponse =
            serde_json::from_str(r#"{"status": "processing", "progress": 42, "frame_count": 120}"#).unwrap();
        assert_eq!(status.status, JobStatus::Processing);
        assert_eq!(status.progress_percent, Some(42.0));
        assert_eq!(status.frames_processed, Some(120));
    }

    #[test]
    fn test_error_from_body() {
        assert_eq!(
            error_from_body(404, r#"{"detail": "task not found"}"#),
            CallError::Service {
                status: 404,
                message: "task not found".to_string()
            }
        );
        assert!(matches!(
            error_from_body(422, r#"{"detail": [{"loc": ["query", "file_id"]}]}"#),
            CallError::Service { status: 422, .. }
        ));
        assert_eq!(error_from_body(502, ""), CallError::Transport("HTTP 502".to_string()));
        assert_eq!(
            error_from_body(500, "Internal Server Error"),
            CallError::Transport("HTTP 500: Internal Server Error".to_string())
        );
    }

    #[test]
    fn test_task_endpoint_encodes_id() {
        let config = crate::config::ConfigBuilder::new()
            .with_base_url("http://localhost:8000/api/")
            .build();
        let service = HttpVideoService::new(&config).unwrap();
        let url = service.task_endpoint("/task_status/{task_id}", "a b/c").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/task_status/a%20b%2Fc");
    }
}
