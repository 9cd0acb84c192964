//! Vision Job Client
//!
//! Client-side controller for a remote video analysis service: uploads a video,
//! submits a detection job with type-specific parameters, tracks the job to a
//! terminal state and retrieves the processed artifact.

pub mod artifact;
pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod job;
pub mod params;
pub mod poller;
pub mod request;
pub mod schema;
pub mod upload;

// Re-export main types for easy access
pub use crate::artifact::{Artifact, ArtifactRetriever};
pub use crate::client::{HttpVideoService, TaskStatusResponse, VideoService};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::controller::{JobController, StatusTicket};
pub use crate::error::{CallError, ClientError, ErrorKind, PreconditionError, Result, ValidationError};
pub use crate::job::{Job, JobStatus, LifecycleState};
pub use crate::params::{JobParameters, ParamValue, Point};
pub use crate::poller::{PollOutcome, StatusPoller};
pub use crate::request::{build_submission, KeyStyle, RequestBuilder, SubmissionRequest, SubmitEncoding};
pub use crate::schema::{DetectionType, DetectionTypeSpec, ParamKind, ParameterSpec};
pub use crate::upload::{UploadCoordinator, UploadedFile};
