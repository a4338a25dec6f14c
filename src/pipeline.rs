//! Submit -> poll -> download orchestration
//!
//! Each stage runs only if the previous one reached its success state. Failures are
//! checkpointed by the stage that observed them before they are returned here.

use crate::client::VideoClient;
use crate::config::Config;
use crate::download::Downloader;
use crate::error::Result;
use crate::metadata::MetadataStore;
use crate::poller::StatusPoller;
use crate::submit::{JobSubmitter, ReferenceImage};
use crate::types::Job;

/// One-job generation pipeline
pub struct Pipeline {
    config: Config,
    client: VideoClient,
    store: MetadataStore,
}

impl Pipeline {
    /// Validate `config` and build the pipeline
    ///
    /// Fails with a configuration error before any network call is made.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let client = VideoClient::new(&config)?;
        let store = MetadataStore::new(config.paths.metadata_dir.clone());
        Ok(Self {
            config,
            client,
            store,
        })
    }

    /// The checkpoint store
    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    /// The API client
    pub fn client(&self) -> &VideoClient {
        &self.client
    }

    /// Run a job to completion
    ///
    /// Returns the `downloaded` job, or the first stage error.
    pub async fn run(&self, prompt: &str, reference: Option<&ReferenceImage>) -> Result<Job> {
        let params = self.config.generation.params();
        let mut job = JobSubmitter::new(&self.client, &self.store)
            .submit(prompt, &params, reference)
            .await?;

        StatusPoller::new(&self.client, &self.store, &self.config.poll)
            .wait_for_completion(&mut job)
            .await?;

        Downloader::new(&self.client, &self.store, &self.config.paths.output_dir)
            .download(&mut job, &self.config.retry)
            .await?;

        Ok(job)
    }
}
