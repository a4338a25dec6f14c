//! # vidgen
//!
//! Submit a video-generation job to a remote rendering service, poll it until it
//! finishes, and download the result with integrity checks.
//!
//! ## Design Philosophy
//!
//! - **One job per run** - submission, polling and download run sequentially
//! - **Checkpoint everything** - every status transition is written to disk before
//!   the next step, so a crash leaves a recoverable record
//! - **Billing-aware errors** - moderation rejections are reported differently
//!   depending on whether the job was already billed
//!
//! ## Quick Start
//!
//! ```no_run
//! use vidgen::{Config, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let pipeline = Pipeline::new(config)?;
//!
//!     let job = pipeline.run("A paper boat drifting down a rainy street", None).await?;
//!     if let Some(artifact) = &job.artifact {
//!         println!("saved {} ({} bytes)", artifact.file_path.display(), artifact.size_bytes);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// HTTP client for the video API
pub mod client;
/// Configuration types
pub mod config;
/// Artifact download and integrity checks
pub mod download;
/// Error types
pub mod error;
/// Job checkpoint persistence
pub mod metadata;
/// Moderation classification
pub mod moderation;
/// Submit -> poll -> download orchestration
pub mod pipeline;
/// Status polling
pub mod poller;
/// Prompt file loading
pub mod prompt;
/// Reference image validation
pub mod reference;
/// Retry logic with exponential backoff
pub mod retry;
/// Job submission
pub mod submit;
/// Core types
pub mod types;

// Re-export commonly used types
pub use config::{Config, PollConfig, RetryConfig};
pub use error::{DownloadError, Error, GenerationError, Result, SubmitError};
pub use metadata::MetadataStore;
pub use moderation::is_moderation_error;
pub use pipeline::Pipeline;
pub use submit::ReferenceImage;
pub use types::{Artifact, FrameSize, GenerationParams, Job, JobId, JobStatus};
