//! Scripted in-memory service shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;

use vision_job_client::client::{
    DownloadResponse, ServiceInfo, SubmitResponse, TaskStatusResponse, UploadPayload, UploadResponse,
};
use vision_job_client::{CallError, SubmissionRequest, VideoService};

type Scripted<T> = Mutex<VecDeque<Result<T, CallError>>>;

/// Answers each endpoint from a queue and records what it was sent
#[derive(Default)]
pub struct ScriptedService {
    uploads: Scripted<UploadResponse>,
    submits: Scripted<SubmitResponse>,
    statuses: Scripted<TaskStatusResponse>,
    downloads: Scripted<DownloadResponse>,

    pub uploaded: Mutex<Vec<UploadPayload>>,
    pub submitted: Mutex<Vec<SubmissionRequest>>,
    pub status_calls: AtomicUsize,
    pub download_calls: AtomicUsize,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upload_ok(self, file_id: &str) -> Self {
        self.uploads.lock().unwrap().push_back(Ok(UploadResponse {
            file_id: file_id.to_string(),
            message: None,
        }));
        self
    }

    pub fn upload_err(self, err: CallError) -> Self {
        self.uploads.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn submit_ok(self, task_id: &str) -> Self {
        self.submits.lock().unwrap().push_back(Ok(SubmitResponse {
            task_id: task_id.to_string(),
            message: None,
        }));
        self
    }

    pub fn submit_err(self, err: CallError) -> Self {
        self.submits.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn status(self, response: TaskStatusResponse) -> Self {
        self.statuses.lock().unwrap().push_back(Ok(response));
        self
    }

    pub fn status_err(self, err: CallError) -> Self {
        self.statuses.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn download_ok(self, bytes: &[u8], content_type: Option<&str>) -> Self {
        self.downloads.lock().unwrap().push_back(Ok(DownloadResponse {
            bytes: bytes.to_vec(),
            content_type: content_type.map(|ct| ct.to_string()),
        }));
        self
    }

    pub fn submit_count(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }

    pub fn upload_count(&self) -> usize {
        self.uploaded.lock().unwrap().len()
    }

    pub fn status_count(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn download_count(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }
}

fn next<T>(queue: &Scripted<T>) -> Result<T, CallError> {
    queue
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| Err(CallError::Transport("no scripted response".to_string())))
}

#[async_trait]
impl VideoService for ScriptedService {
    async fn upload(&self, payload: UploadPayload) -> Result<UploadResponse, CallError> {
        self.uploaded.lock().unwrap().push(payload);
        next(&self.uploads)
    }

    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmitResponse, CallError> {
        self.submitted.lock().unwrap().push(request.clone());
        next(&self.submits)
    }

    async fn task_status(&self, _task_id: &str) -> Result<TaskStatusResponse, CallError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        next(&self.statuses)
    }

    async fn download(&self, _task_id: &str) -> Result<DownloadResponse, CallError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        next(&self.downloads)
    }

    async fn service_info(&self) -> Result<ServiceInfo, CallError> {
        Ok(ServiceInfo {
            message: "scripted".to_string(),
            version: None,
        })
    }
}

/// Write a small fake video into a fresh temp dir
pub async fn fake_video(name: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join(name);
    tokio::fs::write(&path, b"\x00\x00\x00\x18ftypmp42 fake video").await.unwrap();
    (temp_dir, path)
}
