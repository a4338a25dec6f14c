//! HTTP client for the remote video API

use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::Serialize;
use std::time::Duration;

use crate::config::Config;
use crate::error::Result;
use crate::types::{ErrorEnvelope, GenerationParams, JobId, VideoStatusResponse};

/// Timeout for submission and status requests
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Reference image payload attached to a submission
#[derive(Clone, Debug)]
pub struct ReferenceUpload {
    /// File name sent in the multipart part
    pub file_name: String,
    /// MIME type of the image
    pub mime: &'static str,
    /// Raw image bytes
    pub bytes: Vec<u8>,
}

/// JSON body of `POST /videos`
#[derive(Debug, Serialize)]
struct CreateVideoBody<'a> {
    model: &'a str,
    prompt: &'a str,
    seconds: String,
    size: String,
}

/// Raw outcome of an HTTP call that returned a non-success status
#[derive(Clone, Debug)]
pub struct HttpFailure {
    /// Status code
    pub status: StatusCode,
    /// `error.message` from the body, or the raw body text
    pub message: String,
}

/// Client for the `/videos` endpoints
#[derive(Clone, Debug)]
pub struct VideoClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    download_timeout: Duration,
}

impl VideoClient {
    /// Create a client from a validated configuration
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.api_key()?.to_string();
        let http = reqwest::Client::builder()
            .user_agent(concat!("vidgen/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.api.base_url.trim_end_matches('/').to_string(),
            api_key,
            download_timeout: config.download_timeout,
        })
    }

    fn videos_url(&self) -> String {
        format!("{}/videos", self.base_url)
    }

    /// URL of the status endpoint for `id`
    pub fn status_url(&self, id: &JobId) -> String {
        format!("{}/videos/{}", self.base_url, id)
    }

    /// URL of the content endpoint for `id`
    pub fn content_url(&self, id: &JobId) -> String {
        format!("{}/videos/{}/content", self.base_url, id)
    }

    /// `POST /videos`
    ///
    /// Sends a JSON body, or a multipart form when a reference image is attached.
    /// Transport failures are returned as `Err`; HTTP failures are returned as
    /// `Ok(Err(HttpFailure))` so the caller can classify them.
    pub async fn create_video(
        &self,
        prompt: &str,
        params: &GenerationParams,
        reference: Option<&ReferenceUpload>,
    ) -> Result<std::result::Result<serde_json::Value, HttpFailure>> {
        let request = self
            .http
            .post(self.videos_url())
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS));

        let request = match reference {
            None => request.json(&CreateVideoBody {
                model: &params.model,
                prompt,
                seconds: params.duration_seconds.to_string(),
                size: params.frame_size.to_string(),
            }),
            Some(upload) => {
                let part = Part::bytes(upload.bytes.clone())
                    .file_name(upload.file_name.clone())
                    .mime_str(upload.mime)?;
                let form = Form::new()
                    .text("model", params.model.clone())
                    .text("prompt", prompt.to_string())
                    .text("seconds", params.duration_seconds.to_string())
                    .text("size", params.frame_size.to_string())
                    .part("input_reference", part);
                request.multipart(form)
            }
        };

        let response = request.send().await?;
        if !response.status().is_success() {
            return Ok(Err(http_failure(response).await));
        }
        Ok(Ok(response.json().await?))
    }

    /// `GET /videos/{id}`
    pub async fn get_status(
        &self,
        id: &JobId,
    ) -> Result<std::result::Result<VideoStatusResponse, HttpFailure>> {
        let response = self
            .http
            .get(self.status_url(id))
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .send()
            .await?;

        if !response.status().is_success() {
            return Ok(Err(http_failure(response).await));
        }
        Ok(Ok(response.json().await?))
    }

    /// `GET /videos/{id}/content`, returning the unread streaming response
    pub async fn get_content(&self, id: &JobId) -> Result<Response> {
        let response = self
            .http
            .get(self.content_url(id))
            .bearer_auth(&self.api_key)
            .timeout(self.download_timeout)
            .send()
            .await?;
        Ok(response)
    }
}

/// Extract `error.message` from a failed response, falling back to the body text
async fn http_failure(response: Response) -> HttpFailure {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    HttpFailure {
        status,
        message: error_message(&body).unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.to_string()
            } else {
                body
            }
        }),
    }
}

/// `error.message` of an `{ "error": { "message": ... } }` body
pub fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
        .and_then(|error| error.message)
        .filter(|message| !message.trim().is_empty())
}
