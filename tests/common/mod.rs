//! Common test utilities for vidgen integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use vidgen::Config;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mock API server plus scratch directories for one test
pub struct TestEnv {
    pub server: MockServer,
    pub temp_dir: TempDir,
}

impl TestEnv {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
            temp_dir: TempDir::new().unwrap(),
        }
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.temp_dir.path().join("metadata")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.temp_dir.path().join("output")
    }

    /// Configuration pointing at the mock server with millisecond delays
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.api.base_url = format!("{}/v1", self.server.uri());
        config.api.api_key = Some("sk-test".into());
        config.paths.metadata_dir = self.metadata_dir();
        config.paths.output_dir = self.output_dir();
        config.paths.input_dir = self.temp_dir.path().join("input_reference");
        config.poll.interval = Duration::from_millis(1);
        config.retry.initial_delay = Duration::from_millis(5);
        config
    }

    /// Respond to `POST /v1/videos` with `template`
    pub async fn mock_create(&self, template: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/v1/videos"))
            .respond_with(template)
            .mount(&self.server)
            .await;
    }
}

/// `GET /videos/{id}` body with the given status label
pub fn status_body(status: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "status": status,
        "progress": 0,
    }))
}

/// Entries of `dir`, empty if it does not exist
pub fn files_in(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .map(|entries| entries.map(|e| e.unwrap().path()).collect())
        .unwrap_or_default()
}
