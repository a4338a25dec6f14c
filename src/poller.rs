//! Status polling state machine
//!
//! `queued -> processing -> {completed | failed | error}`, plus a local `timeout`
//! once the poll ceiling is reached. Every observed status is checkpointed before
//! the next step.

use crate::client::VideoClient;
use crate::config::PollConfig;
use crate::error::{GenerationError, Result};
use crate::metadata::MetadataStore;
use crate::moderation::is_moderation_error;
use crate::types::{Job, JobStatus, RemoteStatus};

/// Message recorded when the remote reports a failure without details
const UNKNOWN_REMOTE_ERROR: &str = "unknown error";

/// Polls a submitted job until it reaches a terminal state
pub struct StatusPoller<'a> {
    client: &'a VideoClient,
    store: &'a MetadataStore,
    config: &'a PollConfig,
}

impl<'a> StatusPoller<'a> {
    /// Create a poller
    pub fn new(client: &'a VideoClient, store: &'a MetadataStore, config: &'a PollConfig) -> Self {
        Self {
            client,
            store,
            config,
        }
    }

    /// Poll until `completed`, a remote failure, a failed status check, or the ceiling
    ///
    /// On `Ok(())` the job is `completed` and checkpointed. Every `Err` has already
    /// been checkpointed as `failed`, `error` or `timeout`.
    pub async fn wait_for_completion(&self, job: &mut Job) -> Result<()> {
        let mut polls = 0;

        while polls < self.config.max_polls {
            let response = match self.client.get_status(&job.id).await {
                Ok(Ok(response)) => response,
                Ok(Err(failure)) => {
                    let message = format!("status check returned {}: {}", failure.status, failure.message);
                    return self.status_check_failed(job, message).await;
                }
                Err(e) => return self.status_check_failed(job, e.to_string()).await,
            };

            if response.progress.is_some() {
                job.progress = response.progress;
            }

            match response.status {
                RemoteStatus::Completed => {
                    job.advance(JobStatus::Completed);
                    self.store.save(job).await?;
                    tracing::info!(job_id = %job.id, polls = polls + 1, "generation completed");
                    return Ok(());
                }
                RemoteStatus::Failed | RemoteStatus::Error => {
                    let message = response
                        .error
                        .and_then(|e| e.message)
                        .filter(|m| !m.trim().is_empty())
                        .unwrap_or_else(|| UNKNOWN_REMOTE_ERROR.to_string());
                    // Rendering had started, so a moderation rejection here was billed
                    let billable_moderation = is_moderation_error(Some(&message));

                    job.fail(JobStatus::Failed, message.clone());
                    job.billable_moderation = billable_moderation;
                    self.store.save(job).await?;

                    tracing::error!(
                        job_id = %job.id,
                        error = %message,
                        billable_moderation,
                        "generation failed"
                    );
                    return Err(GenerationError::Failed {
                        id: job.id.clone(),
                        message,
                        billable_moderation,
                    }
                    .into());
                }
                RemoteStatus::Queued => {
                    job.advance(JobStatus::Queued);
                }
                RemoteStatus::Processing => {
                    job.advance(JobStatus::Processing);
                }
                RemoteStatus::Unknown => {
                    tracing::debug!(job_id = %job.id, "unrecognized remote status, still waiting");
                }
            }

            self.store.save(job).await?;
            tracing::info!(
                job_id = %job.id,
                status = %job.status,
                progress = job.progress.unwrap_or(0.0),
                poll = polls + 1,
                max_polls = self.config.max_polls,
                "waiting for generation"
            );

            tokio::time::sleep(self.config.interval).await;
            polls += 1;
        }

        let waited = self.config.interval * polls;
        job.fail(
            JobStatus::Timeout,
            format!("no terminal status after {polls} checks ({}s)", waited.as_secs()),
        );
        self.store.save(job).await?;
        tracing::warn!(job_id = %job.id, polls, "gave up waiting for generation");

        Err(GenerationError::Timeout {
            id: job.id.clone(),
            polls,
        }
        .into())
    }

    async fn status_check_failed(&self, job: &mut Job, message: String) -> Result<()> {
        job.fail(JobStatus::Error, message.clone());
        self.store.save(job).await?;
        tracing::error!(job_id = %job.id, error = %message, "status check failed");

        Err(GenerationError::StatusCheck {
            id: job.id.clone(),
            message,
        }
        .into())
    }
}
