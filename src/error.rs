//! Error types for vidgen
//!
//! This module provides error handling for the job lifecycle, including:
//! - Stage-specific error types (Submit, Generation, Download)
//! - Billing classification for moderation rejections
//! - Context information (job ID, HTTP status, byte counts)

use std::path::PathBuf;
use thiserror::Error;

use crate::types::JobId;

/// Result type alias for vidgen operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for vidgen
///
/// Each variant includes contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "SORA_API_KEY")
        key: Option<String>,
    },

    /// Job submission was rejected
    #[error("submission error: {0}")]
    Submit(#[from] SubmitError),

    /// The remote job did not reach `completed`
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),

    /// Artifact download failed
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// Reference image failed validation
    #[error("invalid reference image: {0}")]
    ReferenceImage(String),

    /// Prompt file missing or empty
    #[error("invalid prompt: {0}")]
    Prompt(String),

    /// Job identifier cannot be used as a record key
    #[error("invalid job id: {0:?}")]
    InvalidJobId(String),

    /// No checkpoint exists for the job
    #[error("no checkpoint for job {id} in {}", dir.display())]
    JobNotFound {
        /// Job that was looked up
        id: JobId,
        /// Metadata directory that was searched
        dir: PathBuf,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error for the given key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Submission errors
///
/// No job record exists for any of these: the remote never issued an identifier.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Rejected by content moderation before generation started (not billed)
    #[error("rejected by moderation before generation: {message}")]
    ModerationRejected {
        /// Message returned by the remote service
        message: String,
    },

    /// Request rejected for another reason
    #[error("request rejected with status {status}: {message}")]
    Rejected {
        /// HTTP status code returned by the remote service
        status: u16,
        /// Message returned by the remote service
        message: String,
    },

    /// Success response without a job identifier
    #[error("response did not contain a job id: {body}")]
    MissingJobId {
        /// Raw response body
        body: String,
    },
}

impl SubmitError {
    /// Whether this rejection is guaranteed not to have been billed
    pub fn is_non_billable(&self) -> bool {
        matches!(self, SubmitError::ModerationRejected { .. })
    }
}

/// Errors that end a job before an artifact is available
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The remote reported `failed` or `error`
    #[error("job {id} failed: {message}")]
    Failed {
        /// The job that failed
        id: JobId,
        /// Message returned by the remote service
        message: String,
        /// True when the failure was a moderation rejection after rendering began
        billable_moderation: bool,
    },

    /// A status query failed; the job may still complete server-side
    #[error("status check for job {id} failed: {message}")]
    StatusCheck {
        /// The job being polled
        id: JobId,
        /// Transport or HTTP failure description
        message: String,
    },

    /// The poll ceiling was reached before a terminal state
    #[error("job {id} did not finish after {polls} status checks")]
    Timeout {
        /// The job being polled
        id: JobId,
        /// Number of status checks performed
        polls: u32,
    },
}

/// Download-related errors
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Content endpoint returned a non-success status
    #[error("content request returned status {status}")]
    HttpStatus {
        /// HTTP status code
        status: u16,
    },

    /// Stream ended before the declared content length was reached
    #[error("incomplete transfer: received {received} of {expected} bytes")]
    Incomplete {
        /// Bytes written to the temporary file
        received: u64,
        /// Content-Length declared by the server
        expected: u64,
    },

    /// Stream ended without any bytes
    #[error("downloaded artifact is empty")]
    Empty,

    /// Temporary file could not be moved into place
    #[error("failed to move {temp_path} into place: {reason}")]
    RenameFailed {
        /// Temporary file path
        temp_path: PathBuf,
        /// The reason the rename failed
        reason: String,
    },

    /// All attempts failed
    #[error("download of job {id} failed after {attempts} attempts ({url}): {last_error}")]
    Exhausted {
        /// The job whose artifact could not be downloaded
        id: JobId,
        /// Content URL, for manual retrieval
        url: String,
        /// Number of attempts performed
        attempts: u32,
        /// Description of the final failure
        last_error: String,
    },
}
