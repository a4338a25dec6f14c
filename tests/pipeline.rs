//! End-to-end pipeline scenarios against a mock video API

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use sha2::{Digest, Sha256};
use std::time::Duration;
use vidgen::{DownloadError, Error, GenerationError, JobId, JobStatus, Pipeline, SubmitError};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use common::{TestEnv, files_in, status_body};

#[tokio::test]
async fn scenario_a_processing_then_completed_then_downloaded() {
    let env = TestEnv::start().await;
    let content: Vec<u8> = (0..1000u32).map(|i| (i % 256) as u8).collect();

    env.mock_create(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "v1"})))
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/videos/v1"))
        .respond_with(status_body("processing"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&env.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/videos/v1"))
        .respond_with(status_body("completed"))
        .expect(1)
        .mount(&env.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/videos/v1/content"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.clone()))
        .expect(1)
        .mount(&env.server)
        .await;

    let pipeline = Pipeline::new(env.config()).unwrap();
    let job = pipeline.run("a quiet harbor at dawn", None).await.unwrap();

    assert_eq!(job.status, JobStatus::Downloaded);
    let stored = pipeline.store().load(&JobId::new("v1")).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Downloaded);

    let artifact = stored.artifact.expect("artifact recorded");
    assert_eq!(artifact.size_bytes, 1000);
    assert!(!artifact.sha256.is_empty());
    assert_eq!(artifact.sha256, format!("{:x}", Sha256::digest(&content)));
    assert_eq!(std::fs::read(&artifact.file_path).unwrap(), content);

    let name = artifact.file_path.file_name().unwrap().to_str().unwrap();
    assert_eq!(
        name,
        format!("video_v1_{}.mp4", stored.created_at.timestamp())
    );
    assert_eq!(files_in(&env.output_dir()).len(), 1, "no temp file left behind");
}

#[tokio::test]
async fn scenario_b_moderation_at_submission_is_non_billable_and_unrecorded() {
    let env = TestEnv::start().await;
    env.mock_create(ResponseTemplate::new(400).set_body_json(serde_json::json!({
        "error": {"message": "blocked due to content policy"}
    })))
    .await;

    let pipeline = Pipeline::new(env.config()).unwrap();
    let err = pipeline.run("something disallowed", None).await.unwrap_err();

    match err {
        Error::Submit(submit) => {
            assert!(matches!(submit, SubmitError::ModerationRejected { .. }));
            assert!(submit.is_non_billable());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(files_in(&env.metadata_dir()).is_empty(), "no job record is created");
}

#[tokio::test]
async fn scenario_c_moderation_after_rendering_is_flagged_billable() {
    let env = TestEnv::start().await;
    env.mock_create(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "v1"})))
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/videos/v1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "failed",
            "error": {"message": "rejected: inappropriate content"}
        })))
        .mount(&env.server)
        .await;

    let pipeline = Pipeline::new(env.config()).unwrap();
    let err = pipeline.run("a prompt", None).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Generation(GenerationError::Failed {
            billable_moderation: true,
            ..
        })
    ));
    let stored = pipeline.store().load(&JobId::new("v1")).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert!(stored.billable_moderation);
    assert!(stored.artifact.is_none());
}

#[tokio::test]
async fn scenario_d_sixty_processing_polls_time_out() {
    let env = TestEnv::start().await;
    env.mock_create(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "v1"})))
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/videos/v1"))
        .respond_with(status_body("processing"))
        .expect(60)
        .mount(&env.server)
        .await;

    let pipeline = Pipeline::new(env.config()).unwrap();
    let err = pipeline.run("a slow render", None).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Generation(GenerationError::Timeout { polls: 60, .. })
    ));
    let stored = pipeline.store().load(&JobId::new("v1")).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Timeout);
}

#[tokio::test]
async fn download_that_always_fails_is_attempted_three_times() {
    let env = TestEnv::start().await;
    env.mock_create(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "v1"})))
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/videos/v1"))
        .respond_with(status_body("completed"))
        .mount(&env.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/videos/v1/content"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&env.server)
        .await;

    let pipeline = Pipeline::new(env.config()).unwrap();
    let err = pipeline.run("a prompt", None).await.unwrap_err();

    match err {
        Error::Download(DownloadError::Exhausted { id, url, attempts, .. }) => {
            assert_eq!(id, JobId::new("v1"));
            assert_eq!(attempts, 3);
            assert!(url.ends_with("/v1/videos/v1/content"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let stored = pipeline.store().load(&JobId::new("v1")).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::DownloadFailed);
    assert!(stored.last_error.is_some());
    assert!(files_in(&env.output_dir()).is_empty());
}

#[tokio::test]
async fn empty_artifact_is_retried_then_succeeds() {
    let env = TestEnv::start().await;
    env.mock_create(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "v1"})))
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/videos/v1"))
        .respond_with(status_body("completed"))
        .mount(&env.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/videos/v1/content"))
        .respond_with(ResponseTemplate::new(200))
        .up_to_n_times(1)
        .expect(1)
        .mount(&env.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/videos/v1/content"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![42u8; 64]))
        .expect(1)
        .mount(&env.server)
        .await;

    let pipeline = Pipeline::new(env.config()).unwrap();
    let job = pipeline.run("a prompt", None).await.unwrap();

    assert_eq!(job.status, JobStatus::Downloaded);
    assert_eq!(job.artifact.unwrap().size_bytes, 64);
}

#[tokio::test]
async fn failed_status_check_records_error() {
    let env = TestEnv::start().await;
    env.mock_create(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "v1"})))
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/videos/v1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": {"message": "invalid api key"}
        })))
        .expect(1)
        .mount(&env.server)
        .await;

    let pipeline = Pipeline::new(env.config()).unwrap();
    let err = pipeline.run("a prompt", None).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Generation(GenerationError::StatusCheck { .. })
    ));
    let stored = pipeline.store().load(&JobId::new("v1")).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Error);
    assert!(stored.last_error.unwrap().contains("invalid api key"));
}

#[tokio::test]
async fn placeholder_key_fails_before_any_request() {
    let env = TestEnv::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&env.server)
        .await;

    let mut config = env.config();
    config.api.api_key = Some(vidgen::config::PLACEHOLDER_API_KEY.into());

    assert!(matches!(Pipeline::new(config), Err(Error::Config { .. })));
}

#[tokio::test]
async fn env_built_config_downloads_a_slow_artifact() {
    let env = TestEnv::start().await;
    let base = format!("{}/v1", env.server.uri());
    let mut config = vidgen::Config::from_lookup(|key| match key {
        "SORA_API_KEY" => Some("sk-test".to_string()),
        "SORA_API_BASE" => Some(base.clone()),
        _ => None,
    })
    .unwrap();
    config.paths.metadata_dir = env.metadata_dir();
    config.paths.output_dir = env.output_dir();
    config.poll.interval = Duration::from_millis(1);

    env.mock_create(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "v1"})))
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/videos/v1"))
        .respond_with(status_body("completed"))
        .mount(&env.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/videos/v1/content"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![7u8; 256])
                .set_delay(Duration::from_millis(50)),
        )
        .expect(1)
        .mount(&env.server)
        .await;

    let pipeline = Pipeline::new(config).unwrap();
    let job = pipeline.run("a prompt", None).await.unwrap();

    assert_eq!(job.status, JobStatus::Downloaded);
    assert_eq!(job.artifact.unwrap().size_bytes, 256);
}
