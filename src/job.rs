//! Job record and lifecycle states

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::client::TaskStatusResponse;
use crate::schema::DetectionType;

/// Status of a job as reported by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Submitted,
    Processing,
    Completed,
    Failed,
    Unknown,
}

impl JobStatus {
    /// Map a service status string; anything unrecognised is `Unknown`
    pub fn parse(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "submitted" | "pending" | "queued" => JobStatus::Submitted,
            "processing" | "running" => JobStatus::Processing,
            "completed" | "done" => JobStatus::Completed,
            "failed" | "error" => JobStatus::Failed,
            _ => JobStatus::Unknown,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Submitted => "submitted",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Unknown => "unknown",
        }
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let status = String::deserialize(deserializer)?;
        Ok(JobStatus::parse(&status))
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Controller state machine
///
/// `Idle -> Submitting -> Active -> {Completed, Failed}`. `Unknown` is entered when
/// a status check itself fails; the job keeps its last known status until the
/// next successful check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Idle,
    Submitting,
    Active,
    Completed,
    Failed,
    Unknown,
}

impl LifecycleState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Completed | LifecycleState::Failed)
    }

    /// State implied by a successfully observed job status
    pub fn for_status(status: JobStatus) -> Self {
        match status {
            JobStatus::Submitted | JobStatus::Processing => LifecycleState::Active,
            JobStatus::Completed => LifecycleState::Completed,
            JobStatus::Failed => LifecycleState::Failed,
            JobStatus::Unknown => LifecycleState::Unknown,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Idle => "idle",
            LifecycleState::Submitting => "submitting",
            LifecycleState::Active => "active",
            LifecycleState::Completed => "completed",
            LifecycleState::Failed => "failed",
            LifecycleState::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// One server-side processing run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub task_id: String,
    pub file_id: String,
    pub detection_type: DetectionType,
    pub status: JobStatus,
    pub progress_percent: Option<f64>,
    pub frames_processed: Option<u64>,

    /// Reason the service gave for a failed job
    pub failure_reason: Option<String>,

    /// Error from the most recent status check, cleared by the next successful one
    pub last_check_error: Option<String>,

    pub submitted_at: DateTime<Utc>,
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(task_id: String, file_id: String, detection_type: DetectionType) -> Self {
        Self {
            task_id,
            file_id,
            detection_type,
            status: JobStatus::Submitted,
            progress_percent: None,
            frames_processed: None,
            failure_reason: None,
            last_check_error: None,
            submitted_at: Utc::now(),
            last_checked_at: None,
        }
    }

    /// Fold a status response into the record. Fields the response omits keep
    /// their previous values.
    pub fn apply(&mut self, response: &TaskStatusResponse) {
        if response.status != JobStatus::Unknown {
            self.status = response.status;
        }
        if let Some(progress) = response.progress_percent {
            self.progress_percent = Some(progress.clamp(0.0, 100.0));
        }
        if let Some(frames) = response.frames_processed {
            self.frames_processed = Some(frames);
        }
        if response.status == JobStatus::Failed {
            self.failure_reason = response.error.clone().or_else(|| response.message.clone());
        }
        self.last_check_error = None;
        self.last_checked_at = Some(Utc::now());
    }

    /// Record a failed status check without touching the observed progress
    pub fn mark_check_failed(&mut self, error: String) {
        self.last_check_error = Some(error);
    }

    /// True when the last status check failed and the status shown is the last known one
    pub fn is_stale(&self) -> bool {
        self.last_check_error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(json: serde_json::Value) -> TaskStatusResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_status_names() {
        let parsed: JobStatus = serde_json::from_str("\"processing\"").unwrap();
        assert_eq!(parsed, JobStatus::Processing);
        let parsed: JobStatus = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(parsed, JobStatus::Submitted);
        let parsed: JobStatus = serde_json::from_str("\"exploded\"").unwrap();
        assert_eq!(parsed, JobStatus::Unknown);
        assert!(JobStatus::Completed.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }

    #[test]
    fn test_apply_keeps_omitted_fields() {
        let mut job = Job::new("t1".to_string(), "f1".to_string(), DetectionType::Loitering);
        job.apply(&status(serde_json::json!({"status": "processing", "progressPercent": 42})));
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.progress_percent, Some(42.0));

        job.apply(&status(serde_json::json!({"status": "completed", "framesProcessed": 900})));
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress_percent, Some(42.0));
        assert_eq!(job.frames_processed, Some(900));
        assert!(job.last_checked_at.is_some());
    }

    #[test]
    fn test_apply_failure_reason() {
        let mut job = Job::new("t1".to_string(), "f1".to_string(), DetectionType::Banner);
        job.apply(&status(serde_json::json!({"status": "failed", "error": "cannot decode video"})));
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.failure_reason.as_deref(), Some("cannot decode video"));
    }

    #[test]
    fn test_check_failure_marks_stale() {
        let mut job = Job::new("t1".to_string(), "f1".to_string(), DetectionType::Leave);
        job.apply(&status(serde_json::json!({"status": "processing", "progress": 10})));
        job.mark_check_failed("connection reset".to_string());
        assert!(job.is_stale());
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.progress_percent, Some(10.0));

        job.apply(&status(serde_json::json!({"status": "processing", "progress": 20})));
        assert!(!job.is_stale());
    }

    #[test]
    fn test_lifecycle_for_status() {
        assert_eq!(LifecycleState::for_status(JobStatus::Processing), LifecycleState::Active);
        assert_eq!(LifecycleState::for_status(JobStatus::Submitted), LifecycleState::Active);
        assert_eq!(LifecycleState::for_status(JobStatus::Completed), LifecycleState::Completed);
        assert_eq!(LifecycleState::for_status(JobStatus::Failed), LifecycleState::Failed);
    }
}
