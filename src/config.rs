//! Configuration types for vidgen

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::error::{Error, Result};
use crate::types::{FrameSize, GenerationParams};

/// Placeholder shipped in example `.env` files; never a usable key
pub const PLACEHOLDER_API_KEY: &str = "your_api_key_here";

/// Environment variable holding the API credential
pub const ENV_API_KEY: &str = "SORA_API_KEY";
/// Environment variable overriding the model name
pub const ENV_MODEL: &str = "SORA_MODEL";
/// Environment variable overriding the clip duration in seconds
pub const ENV_DURATION: &str = "SORA_DURATION";
/// Environment variable overriding the frame size (`WIDTHxHEIGHT`)
pub const ENV_SIZE: &str = "SORA_SIZE";
/// Environment variable overriding the API base URL
pub const ENV_API_BASE: &str = "SORA_API_BASE";

/// Remote API connection settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the video API, without trailing `/videos` (default: OpenAI v1)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
        }
    }
}

/// Generation parameters sent with every submission
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Model identifier (default: "sora-2-pro")
    #[serde(default = "default_model")]
    pub model: String,

    /// Clip length in seconds (default: 8)
    #[serde(default = "default_duration_seconds")]
    pub duration_seconds: u32,

    /// Frame size (default: 1280x720)
    #[serde(default)]
    pub frame_size: FrameSize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            duration_seconds: default_duration_seconds(),
            frame_size: FrameSize::default(),
        }
    }
}

impl GenerationConfig {
    /// Snapshot of the parameters recorded on each job
    pub fn params(&self) -> GenerationParams {
        GenerationParams {
            model: self.model.clone(),
            duration_seconds: self.duration_seconds,
            frame_size: self.frame_size,
        }
    }
}

/// On-disk locations, all created on demand
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Job checkpoint directory (default: "./metadata")
    #[serde(default = "default_metadata_dir")]
    pub metadata_dir: PathBuf,

    /// Downloaded artifact directory (default: "./output")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Directory reference images must live under (default: "./input_reference")
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            metadata_dir: default_metadata_dir(),
            output_dir: default_output_dir(),
            input_dir: default_input_dir(),
        }
    }
}

/// Status polling behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollConfig {
    /// Delay between status checks (default: 10 seconds)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub interval: Duration,

    /// Status checks before giving up with `timeout` (default: 60)
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: default_poll_interval(),
            max_polls: default_max_polls(),
        }
    }
}

/// Retry behavior for artifact downloads
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts, including the first (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay after the first failed attempt (default: 5 seconds)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between attempts (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

/// Main configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Remote API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Generation parameters
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Directories
    #[serde(default)]
    pub paths: PathsConfig,

    /// Status polling
    #[serde(default)]
    pub poll: PollConfig,

    /// Download retries
    #[serde(default)]
    pub retry: RetryConfig,

    /// Per-attempt timeout for the content download (default: 300 seconds)
    #[serde(default = "default_download_timeout", with = "duration_serde")]
    pub download_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            generation: GenerationConfig::default(),
            paths: PathsConfig::default(),
            poll: PollConfig::default(),
            retry: RetryConfig::default(),
            download_timeout: default_download_timeout(),
        }
    }
}

impl Config {
    /// Build a configuration from the process environment on top of the defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup on top of the defaults
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        config.api.api_key = get(ENV_API_KEY);
        if let Some(base) = get(ENV_API_BASE) {
            config.api.base_url = base.trim_end_matches('/').to_string();
        }
        if let Some(model) = get(ENV_MODEL) {
            config.generation.model = model;
        }
        if let Some(duration) = get(ENV_DURATION) {
            config.generation.duration_seconds = duration.trim().parse().map_err(|_| {
                Error::config(
                    ENV_DURATION,
                    format!("expected a whole number of seconds, got {duration:?}"),
                )
            })?;
        }
        if let Some(size) = get(ENV_SIZE) {
            config.generation.frame_size = size
                .parse()
                .map_err(|e: String| Error::config(ENV_SIZE, e))?;
        }

        Ok(config)
    }

    /// Check the configuration before any network call is made
    pub fn validate(&self) -> Result<()> {
        self.api_key()?;

        if url::Url::parse(&self.api.base_url).is_err() {
            return Err(Error::config(
                "api.base_url",
                format!("not a valid URL: {}", self.api.base_url),
            ));
        }
        if self.generation.duration_seconds == 0 {
            return Err(Error::config(ENV_DURATION, "duration must be at least 1 second"));
        }
        if self.poll.max_polls == 0 {
            return Err(Error::config("poll.max_polls", "must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::config("retry.max_attempts", "must be at least 1"));
        }
        if !self.retry.backoff_multiplier.is_finite() || self.retry.backoff_multiplier < 1.0 {
            return Err(Error::config(
                "retry.backoff_multiplier",
                format!("must be a finite number >= 1.0, got {}", self.retry.backoff_multiplier),
            ));
        }
        if self.download_timeout.is_zero() {
            return Err(Error::config("download_timeout", "must be greater than zero"));
        }
        Ok(())
    }

    /// The API key, rejecting missing and placeholder values
    pub fn api_key(&self) -> Result<&str> {
        match self.api.api_key.as_deref().map(str::trim) {
            None | Some("") => Err(Error::config(
                ENV_API_KEY,
                format!("{ENV_API_KEY} is not set"),
            )),
            Some(PLACEHOLDER_API_KEY) => Err(Error::config(
                ENV_API_KEY,
                format!("{ENV_API_KEY} still holds the placeholder value"),
            )),
            Some(key) => Ok(key),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "sora-2-pro".to_string()
}

fn default_duration_seconds() -> u32 {
    8
}

fn default_metadata_dir() -> PathBuf {
    PathBuf::from("metadata")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("input_reference")
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_max_polls() -> u32 {
    60
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(300)
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
