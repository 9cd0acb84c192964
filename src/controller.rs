//! Job lifecycle controller
//!
//! Owns the selected file, the one tracked job and the lifecycle state. Every
//! operation is an explicit call; the controller never polls on its own (see
//! [`crate::poller`] for an optional driver).

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::artifact::{Artifact, ArtifactRetriever};
use crate::client::{TaskStatusResponse, VideoService};
use crate::config::Config;
use crate::error::{CallError, ClientError, PreconditionError, Result, ValidationError};
use crate::job::{Job, JobStatus, LifecycleState};
use crate::params::JobParameters;
use crate::request::{RequestBuilder, SubmissionRequest};
use crate::upload::{UploadCoordinator, UploadedFile};

/// Handle for one in-flight status check. Results are applied only if no newer
/// check for the same job has been applied already.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTicket {
    task_id: String,
    seq: u64,
}

impl StatusTicket {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

pub struct JobController {
    service: Arc<dyn VideoService>,
    builder: RequestBuilder,
    uploader: UploadCoordinator,
    retriever: ArtifactRetriever,
    file: Option<UploadedFile>,
    job: Option<Job>,
    state: LifecycleState,
    issued_seq: u64,
    applied_seq: u64,
}

impl JobController {
    pub fn new(service: Arc<dyn VideoService>, config: &Config) -> Self {
        Self {
            builder: RequestBuilder::new(config.service.submit_path.clone()),
            uploader: UploadCoordinator::new(Arc::clone(&service), config.upload.clone()),
            retriever: ArtifactRetriever::new(Arc::clone(&service)),
            service,
            file: None,
            job: None,
            state: LifecycleState::Idle,
            issued_seq: 0,
            applied_seq: 0,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn job(&self) -> Option<&Job> {
        self.job.as_ref()
    }

    pub fn file(&self) -> Option<&UploadedFile> {
        self.file.as_ref()
    }

    pub fn file_id(&self) -> Option<&str> {
        self.file.as_ref().and_then(|f| f.file_id())
    }

    pub fn request_builder(&self) -> &RequestBuilder {
        &self.builder
    }

    /// Select a local file. Any id from a previously selected file is dropped.
    pub fn select_file(&mut self, path: impl Into<PathBuf>) -> &UploadedFile {
        let file = UploadedFile::select(path);
        debug!("Selected {}", file.path().display());
        self.file.insert(file)
    }

    /// Upload the selected file and remember its id
    pub async fn upload(&mut self) -> Result<String> {
        let file = self.file.as_ref().ok_or(ValidationError::NoFileSelected)?;
        let file_id = self.uploader.upload(file).await?;
        if let Some(file) = self.file.as_mut() {
            file.mark_uploaded(file_id.clone());
        }
        Ok(file_id)
    }

    /// Build a request for the uploaded file and submit it
    pub async fn start_detection(&mut self, parameters: &JobParameters) -> Result<String> {
        let request = self.builder.build_from_parameters(self.file_id(), parameters)?;
        self.submit(request).await
    }

    /// Submit a job. On success the new job replaces any tracked one; the old
    /// job is not cancelled on the server, only forgotten here.
    pub async fn submit(&mut self, request: SubmissionRequest) -> Result<String> {
        let previous = self.state;
        self.state = LifecycleState::Submitting;
        info!("🚀 Submitting {} job for file {}", request.detection_type(), request.file_id());

        match self.service.submit(&request).await {
            Ok(response) if !response.task_id.trim().is_empty() => {
                let task_id = response.task_id.trim().to_string();
                if let Some(old) = &self.job {
                    if !old.status.is_terminal() {
                        warn!("Task {} is still running and will no longer be tracked", old.task_id);
                    }
                }
                self.job = Some(Job::new(
                    task_id.clone(),
                    request.file_id().to_string(),
                    request.detection_type(),
                ));
                self.state = LifecycleState::Active;
                // checks issued for the previous job must not land on this one
                self.applied_seq = self.issued_seq;
                info!("✅ Task {} accepted", task_id);
                Ok(task_id)
            }
            Ok(_) => {
                self.state = previous;
                Err(ClientError::SubmissionFailed(CallError::Decode(
                    "service returned an empty task id".to_string(),
                )))
            }
            Err(e) => {
                self.state = previous;
                warn!("❌ Submission failed: {}", e);
                Err(ClientError::SubmissionFailed(e))
            }
        }
    }

    /// Refresh the job status from the service. Terminal jobs are returned as
    /// they are without contacting the service.
    pub async fn check_status(&mut self, task_id: &str) -> Result<Job> {
        let job = self.tracked_job(task_id)?;
        if job.status.is_terminal() {
            debug!("Task {} already {}", task_id, job.status);
            return Ok(job.clone());
        }

        let ticket = self.begin_status_check(task_id)?;
        let outcome = self.service.task_status(task_id).await;
        self.apply_status(ticket, outcome)
    }

    /// Issue a ticket for a status check of the tracked job
    pub fn begin_status_check(&mut self, task_id: &str) -> Result<StatusTicket> {
        self.tracked_job(task_id)?;
        self.issued_seq += 1;
        Ok(StatusTicket {
            task_id: task_id.to_string(),
            seq: self.issued_seq,
        })
    }

    /// Apply the outcome of a status check. Stale outcomes (superseded by a newer
    /// applied check, or for a job no longer tracked) are ignored and the current
    /// job is returned.
    pub fn apply_status(
        &mut self,
        ticket: StatusTicket,
        outcome: std::result::Result<TaskStatusResponse, CallError>,
    ) -> Result<Job> {
        let current_seq = self.applied_seq;
        let job = match self.job.as_mut() {
            Some(job) if job.task_id == ticket.task_id => job,
            Some(job) => {
                debug!("Ignoring status for untracked task {}", ticket.task_id);
                return Ok(job.clone());
            }
            None => return Err(PreconditionError::NoActiveJob.into()),
        };

        if ticket.seq <= current_seq || job.status.is_terminal() {
            debug!("Ignoring stale status check #{} for {}", ticket.seq, ticket.task_id);
            return Ok(job.clone());
        }
        self.applied_seq = ticket.seq;

        match outcome {
            Ok(response) if response.status == JobStatus::Unknown => {
                let message = "service reported an unrecognised status".to_string();
                warn!("⚠️ Task {}: {}", job.task_id, message);
                job.mark_check_failed(message);
                self.state = LifecycleState::Unknown;
                Ok(job.clone())
            }
            Ok(response) => {
                job.apply(&response);
                self.state = LifecycleState::for_status(job.status);
                match job.status {
                    JobStatus::Completed => info!("🎉 Task {} completed", job.task_id),
                    JobStatus::Failed => warn!(
                        "❌ Task {} failed: {}",
                        job.task_id,
                        job.failure_reason.as_deref().unwrap_or("no reason given")
                    ),
                    _ => debug!(
                        "Task {} {} ({:?}%)",
                        job.task_id, job.status, job.progress_percent
                    ),
                }
                Ok(job.clone())
            }
            Err(e) => {
                warn!("⚠️ Status check for {} failed, keeping last known status {}: {}", job.task_id, job.status, e);
                job.mark_check_failed(e.to_string());
                self.state = LifecycleState::Unknown;
                Err(ClientError::StatusCheckFailed(e))
            }
        }
    }

    /// Download the artifact of a completed job
    pub async fn download(&self, task_id: &str) -> Result<Artifact> {
        let job = self.tracked_job(task_id)?;
        if job.status != JobStatus::Completed {
            return Err(PreconditionError::NotReady {
                task_id: task_id.to_string(),
                status: job.status.to_string(),
            }
            .into());
        }
        self.retriever.retrieve(task_id).await
    }

    /// Forget the tracked job and return to `Idle`; the selected file is kept
    pub fn reset(&mut self) {
        if let Some(job) = self.job.take() {
            debug!("Discarding task {}", job.task_id);
        }
        self.state = LifecycleState::Idle;
        self.applied_seq = self.issued_seq;
    }

    fn tracked_job(&self, task_id: &str) -> Result<&Job> {
        match &self.job {
            Some(job) if job.task_id == task_id => Ok(job),
            Some(job) => Err(PreconditionError::TaskMismatch {
                tracked: job.task_id.clone(),
                requested: task_id.to_string(),
            }
            .into()),
            None => Err(PreconditionError::NoActiveJob.into()),
        }
    }
}
