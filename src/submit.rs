//! Job submission
//!
//! A submission either yields a `queued` [`Job`] that is already checkpointed, or a
//! [`SubmitError`]. A rejection never leaves a record behind because the remote
//! service has not issued an identifier.

use std::path::PathBuf;

use crate::client::{ReferenceUpload, VideoClient};
use crate::error::{Result, SubmitError};
use crate::metadata::MetadataStore;
use crate::moderation::is_moderation_error;
use crate::types::{GenerationParams, Job, JobId};

/// A validated reference image ready to upload
#[derive(Clone, Debug)]
pub struct ReferenceImage {
    /// Path recorded on the job
    pub path: PathBuf,
    /// Upload payload
    pub upload: ReferenceUpload,
}

/// Issues creation requests and checkpoints accepted jobs
pub struct JobSubmitter<'a> {
    client: &'a VideoClient,
    store: &'a MetadataStore,
}

impl<'a> JobSubmitter<'a> {
    /// Create a submitter over the given client and store
    pub fn new(client: &'a VideoClient, store: &'a MetadataStore) -> Self {
        Self { client, store }
    }

    /// Submit a generation request
    ///
    /// Callers must have obtained the user's confirmation beforehand; submitting a
    /// job may be billed.
    pub async fn submit(
        &self,
        prompt: &str,
        params: &GenerationParams,
        reference: Option<&ReferenceImage>,
    ) -> Result<Job> {
        tracing::info!(
            model = %params.model,
            duration_seconds = params.duration_seconds,
            frame_size = %params.frame_size,
            with_reference = reference.is_some(),
            "submitting generation request"
        );

        let body = match self
            .client
            .create_video(prompt, params, reference.map(|r| &r.upload))
            .await?
        {
            Ok(body) => body,
            Err(failure) if failure.status.is_client_error() => {
                if is_moderation_error(Some(&failure.message)) {
                    tracing::warn!(message = %failure.message, "submission rejected by moderation");
                    return Err(SubmitError::ModerationRejected {
                        message: failure.message,
                    }
                    .into());
                }
                tracing::warn!(
                    status = failure.status.as_u16(),
                    message = %failure.message,
                    "submission rejected"
                );
                return Err(SubmitError::Rejected {
                    status: failure.status.as_u16(),
                    message: failure.message,
                }
                .into());
            }
            Err(failure) => {
                tracing::warn!(
                    status = failure.status.as_u16(),
                    message = %failure.message,
                    "submission failed"
                );
                return Err(SubmitError::Rejected {
                    status: failure.status.as_u16(),
                    message: failure.message,
                }
                .into());
            }
        };

        let id = match body.get("id").and_then(|id| id.as_str()) {
            Some(id) if !id.trim().is_empty() => JobId::new(id),
            _ => {
                return Err(SubmitError::MissingJobId {
                    body: body.to_string(),
                }
                .into());
            }
        };

        let job = Job::new(
            id,
            prompt,
            params.clone(),
            reference.map(|r| r.path.clone()),
        );
        self.store.save(&job).await?;

        tracing::info!(job_id = %job.id, "generation job created");
        Ok(job)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::Error;
    use crate::types::{FrameSize, JobStatus};
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn params() -> GenerationParams {
        GenerationParams {
            model: "sora-2-pro".into(),
            duration_seconds: 8,
            frame_size: FrameSize::default(),
        }
    }

    async fn setup(template: ResponseTemplate) -> (MockServer, VideoClient, MetadataStore, TempDir) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/videos"))
            .respond_with(template)
            .mount(&server)
            .await;

        let mut config = Config::default();
        config.api.base_url = format!("{}/v1", server.uri());
        config.api.api_key = Some("sk-test".into());
        let client = VideoClient::new(&config).unwrap();

        let temp_dir = TempDir::new().unwrap();
        let store = MetadataStore::new(temp_dir.path().join("metadata"));
        (server, client, store, temp_dir)
    }

    fn record_count(store: &MetadataStore) -> usize {
        std::fs::read_dir(store.dir())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn accepted_submission_is_checkpointed_as_queued() {
        let (_server, client, store, _tmp) = setup(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "video_1"})),
        )
        .await;

        let job = JobSubmitter::new(&client, &store)
            .submit("a paper boat", &params(), None)
            .await
            .unwrap();

        assert_eq!(job.id, JobId::new("video_1"));
        assert_eq!(job.status, JobStatus::Queued);
        let stored = store.load(&job.id).await.unwrap().unwrap();
        assert_eq!(stored, job);
    }

    #[tokio::test]
    async fn reference_path_is_recorded_on_job() {
        let (_server, client, store, _tmp) = setup(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "video_ref"})),
        )
        .await;
        let reference = ReferenceImage {
            path: PathBuf::from("input_reference/cat.png"),
            upload: ReferenceUpload {
                file_name: "cat.png".into(),
                mime: "image/png",
                bytes: vec![1, 2, 3],
            },
        };

        let job = JobSubmitter::new(&client, &store)
            .submit("a cat", &params(), Some(&reference))
            .await
            .unwrap();

        assert_eq!(
            job.reference_image_path,
            Some(PathBuf::from("input_reference/cat.png"))
        );
    }

    #[tokio::test]
    async fn moderation_400_is_non_billable_and_not_persisted() {
        let (_server, client, store, _tmp) = setup(ResponseTemplate::new(400).set_body_json(
            serde_json::json!({"error": {"message": "blocked due to content policy"}}),
        ))
        .await;

        let err = JobSubmitter::new(&client, &store)
            .submit("x", &params(), None)
            .await
            .unwrap_err();

        match err {
            Error::Submit(submit) => {
                assert!(submit.is_non_billable());
                assert!(matches!(submit, SubmitError::ModerationRejected { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(record_count(&store), 0);
    }

    #[tokio::test]
    async fn generic_400_is_plain_rejection() {
        let (_server, client, store, _tmp) = setup(ResponseTemplate::new(400).set_body_json(
            serde_json::json!({"error": {"message": "Invalid value for seconds"}}),
        ))
        .await;

        let err = JobSubmitter::new(&client, &store)
            .submit("x", &params(), None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Submit(SubmitError::Rejected { status: 400, .. })
        ));
        assert_eq!(record_count(&store), 0);
    }

    #[tokio::test]
    async fn server_error_is_generic_even_with_moderation_words() {
        let (_server, client, store, _tmp) = setup(
            ResponseTemplate::new(500).set_body_string("moderation service unavailable"),
        )
        .await;

        let err = JobSubmitter::new(&client, &store)
            .submit("x", &params(), None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Submit(SubmitError::Rejected { status: 500, .. })
        ));
        assert_eq!(record_count(&store), 0);
    }

    #[tokio::test]
    async fn success_without_id_is_protocol_violation() {
        let (_server, client, store, _tmp) = setup(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "queued"})),
        )
        .await;

        let err = JobSubmitter::new(&client, &store)
            .submit("x", &params(), None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Submit(SubmitError::MissingJobId { .. })
        ));
        assert_eq!(record_count(&store), 0);
    }
}
