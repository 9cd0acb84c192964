//! Error types for the job submission client

use std::path::PathBuf;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors surfaced by the client
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    #[error("Upload failed: {0}")]
    UploadFailed(#[source] CallError),

    #[error("Submission failed: {0}")]
    SubmissionFailed(#[source] CallError),

    #[error("Status check failed: {0}")]
    StatusCheckFailed(#[source] CallError),

    #[error("Download failed: {0}")]
    DownloadFailed(#[source] CallError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Bad or missing local input, caught before anything is sent
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("no file selected")]
    NoFileSelected,

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("file is too large: {size} bytes (limit {limit})")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("no file id: upload a video first")]
    MissingFileId,

    #[error("unknown detection type: {0}")]
    UnknownDetectionType(String),

    #[error("invalid value for {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("{detection_type} requires parameter {name}")]
    MissingParameter { detection_type: String, name: String },

    #[error("{detection_type} does not accept parameter {name}")]
    UnexpectedParameter { detection_type: String, name: String },

    #[error("invalid region of interest: {0}")]
    InvalidRoi(String),
}

/// Operation invoked while the controller is in the wrong state
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PreconditionError {
    #[error("task {task_id} is not ready for download (status: {status})")]
    NotReady { task_id: String, status: String },

    #[error("no job has been submitted")]
    NoActiveJob,

    #[error("task {requested} is not tracked (current task: {tracked})")]
    TaskMismatch { tracked: String, requested: String },
}

/// Failure of a single call to the remote service
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CallError {
    /// No usable response: connection failure, timeout, or a non-2xx status without an error payload
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with a well-formed error payload
    #[error("service error {status}: {message}")]
    Service { status: u16, message: String },

    /// 2xx response whose body could not be understood
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for CallError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CallError::Decode(err.to_string())
        } else {
            CallError::Transport(err.to_string())
        }
    }
}

/// Coarse classification used by callers deciding how to report a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Transport,
    Service,
    Precondition,
    Local,
}

impl CallError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CallError::Transport(_) | CallError::Decode(_) => ErrorKind::Transport,
            CallError::Service { .. } => ErrorKind::Service,
        }
    }
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Validation(_) => ErrorKind::Validation,
            ClientError::Precondition(_) => ErrorKind::Precondition,
            ClientError::UploadFailed(e)
            | ClientError::SubmissionFailed(e)
            | ClientError::StatusCheckFailed(e)
            | ClientError::DownloadFailed(e) => e.kind(),
            ClientError::Io(_) | ClientError::Config(_) => ErrorKind::Local,
        }
    }

    /// The underlying service call error, if this failure came from the network
    pub fn call_error(&self) -> Option<&CallError> {
        match self {
            ClientError::UploadFailed(e)
            | ClientError::SubmissionFailed(e)
            | ClientError::StatusCheckFailed(e)
            | ClientError::DownloadFailed(e) => Some(e),
            _ => None,
        }
    }
}
