//! Core types for vidgen

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Opaque job identifier issued by the remote service
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Create a new JobId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job lifecycle status
///
/// `Queued` and `Processing` are reported by the remote service, `Timeout`,
/// `Downloaded` and `DownloadFailed` are local outcomes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted by the remote service, not started
    Queued,
    /// Rendering in progress
    Processing,
    /// Rendering finished, artifact available
    Completed,
    /// Remote reported a failure
    Failed,
    /// Status could not be determined (status check failed)
    Error,
    /// Poll ceiling reached
    Timeout,
    /// Artifact stored locally
    Downloaded,
    /// All download attempts failed
    DownloadFailed,
}

impl JobStatus {
    /// Whether polling stops at this status
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Queued | JobStatus::Processing)
    }

    /// Whether moving from `self` to `next` keeps the lifecycle monotonic
    ///
    /// Re-recording the current status is always allowed.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;

        if *self == next {
            return true;
        }
        match self {
            Queued => matches!(next, Processing | Completed | Failed | Error | Timeout),
            Processing => matches!(next, Completed | Failed | Error | Timeout),
            Completed => matches!(next, Downloaded | DownloadFailed),
            Failed | Error | Timeout | Downloaded | DownloadFailed => false,
        }
    }

    /// Lowercase label as persisted
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Error => "error",
            JobStatus::Timeout => "timeout",
            JobStatus::Downloaded => "downloaded",
            JobStatus::DownloadFailed => "download_failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output frame size, written as `WIDTHxHEIGHT`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FrameSize {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl FrameSize {
    /// Create a new frame size
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for FrameSize {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

impl std::fmt::Display for FrameSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl std::str::FromStr for FrameSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
        let width: u32 = w
            .parse()
            .map_err(|_| format!("invalid width in frame size {s:?}"))?;
        let height: u32 = h
            .parse()
            .map_err(|_| format!("invalid height in frame size {s:?}"))?;
        if width == 0 || height == 0 {
            return Err(format!("frame size must be non-zero, got {s:?}"));
        }
        Ok(Self { width, height })
    }
}

impl TryFrom<String> for FrameSize {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FrameSize> for String {
    fn from(size: FrameSize) -> Self {
        size.to_string()
    }
}

/// Immutable generation parameters captured at submission
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Remote model identifier
    pub model: String,
    /// Clip length in seconds
    pub duration_seconds: u32,
    /// Output frame size
    pub frame_size: FrameSize,
}

/// Locally stored artifact
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Final path of the downloaded file
    pub file_path: PathBuf,
    /// Size in bytes
    pub size_bytes: u64,
    /// Hex-encoded SHA-256 of the content
    pub sha256: String,
}

/// One remote video-generation request and its observed lifecycle
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Identifier issued by the remote service
    pub id: JobId,
    /// Prompt text
    pub prompt: String,
    /// Generation parameters
    #[serde(flatten)]
    pub params: GenerationParams,
    /// Reference image, if one was supplied and validated
    #[serde(default)]
    pub reference_image_path: Option<PathBuf>,
    /// Current status
    pub status: JobStatus,
    /// Last remote-reported progress percentage
    #[serde(default)]
    pub progress: Option<f64>,
    /// Last failure message
    #[serde(default)]
    pub last_error: Option<String>,
    /// Set when the remote rejected the job for moderation after rendering began
    #[serde(default)]
    pub billable_moderation: bool,
    /// Submission time
    pub created_at: DateTime<Utc>,
    /// Time of the last transition
    pub updated_at: DateTime<Utc>,
    /// Downloaded artifact; present only when `status == downloaded`
    #[serde(default)]
    pub artifact: Option<Artifact>,
}

impl Job {
    /// Create a freshly submitted job in `queued` state
    pub fn new(
        id: JobId,
        prompt: impl Into<String>,
        params: GenerationParams,
        reference_image_path: Option<PathBuf>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            prompt: prompt.into(),
            params,
            reference_image_path,
            status: JobStatus::Queued,
            progress: None,
            last_error: None,
            billable_moderation: false,
            created_at: now,
            updated_at: now,
            artifact: None,
        }
    }

    /// Move to `next` if the lifecycle allows it
    ///
    /// Returns false (and leaves the status untouched) for backward moves, such as
    /// a remote `queued` label arriving after `processing`.
    pub fn advance(&mut self, next: JobStatus) -> bool {
        self.updated_at = Utc::now();
        if !self.status.can_transition_to(next) {
            tracing::debug!(
                job_id = %self.id,
                from = %self.status,
                to = %next,
                "ignoring non-monotonic status transition"
            );
            return false;
        }
        self.status = next;
        true
    }

    /// Move to a failure-adjacent status and record the message
    pub fn fail(&mut self, status: JobStatus, message: impl Into<String>) -> bool {
        let moved = self.advance(status);
        if moved {
            self.last_error = Some(message.into());
        }
        moved
    }

    /// Record a successful download
    pub fn mark_downloaded(&mut self, artifact: Artifact) -> bool {
        let moved = self.advance(JobStatus::Downloaded);
        if moved {
            self.artifact = Some(artifact);
            self.last_error = None;
        }
        moved
    }
}

/// Status label as reported by the remote service
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    /// Waiting to start
    Queued,
    /// Rendering
    #[serde(alias = "in_progress")]
    Processing,
    /// Finished
    Completed,
    /// Failed
    Failed,
    /// Failed with an internal error
    Error,
    /// Any label this client does not know about; treated as non-terminal
    #[serde(other)]
    Unknown,
}

/// Structured error object returned by the remote service
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RemoteError {
    /// Human-readable message
    #[serde(default)]
    pub message: Option<String>,
    /// Machine-readable code
    #[serde(default)]
    pub code: Option<String>,
}

/// Error envelope `{ "error": { ... } }`
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ErrorEnvelope {
    /// The error object
    #[serde(default)]
    pub error: Option<RemoteError>,
}

/// Response of `GET /videos/{id}`
#[derive(Clone, Debug, Deserialize)]
pub struct VideoStatusResponse {
    /// Current remote status
    pub status: RemoteStatus,
    /// Progress percentage
    #[serde(default)]
    pub progress: Option<f64>,
    /// Failure details
    #[serde(default)]
    pub error: Option<RemoteError>,
}
