//! Artifact download with integrity checks
//!
//! Each attempt streams the content into `<final>.tmp` while hashing it, checks the
//! byte count against the declared length, then renames the file into place. The
//! temporary file is removed on every failure path. Attempts are driven by
//! [`download_with_retry`].

use futures::{Stream, StreamExt};
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::client::VideoClient;
use crate::config::RetryConfig;
use crate::error::{DownloadError, Error, Result};
use crate::metadata::MetadataStore;
use crate::retry::download_with_retry;
use crate::types::{Artifact, Job, JobId, JobStatus};

/// File name of the artifact for `id` submitted at `submitted_at` (Unix seconds)
pub fn artifact_file_name(id: &JobId, submitted_at: i64) -> String {
    format!("video_{id}_{submitted_at}.mp4")
}

/// Temporary path used while `final_path` is being written
pub fn temp_path_for(final_path: &Path) -> PathBuf {
    let mut name = OsString::from(final_path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Write `stream` to `final_path` through a temporary file
///
/// The SHA-256 digest and byte count are computed while writing and are not
/// recomputed from the final file. Fails with [`DownloadError::Incomplete`] when a
/// declared length does not match, and [`DownloadError::Empty`] when nothing arrived.
pub async fn persist_stream<S, B, E>(
    stream: S,
    declared_len: Option<u64>,
    final_path: &Path,
) -> Result<Artifact>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    Error: From<E>,
{
    let temp_path = temp_path_for(final_path);

    let (received, sha256) = match write_hashed(stream, declared_len, &temp_path).await {
        Ok(written) => written,
        Err(e) => {
            remove_temp(&temp_path).await;
            return Err(e);
        }
    };

    if let Some(expected) = declared_len
        && expected != received
    {
        remove_temp(&temp_path).await;
        return Err(DownloadError::Incomplete { received, expected }.into());
    }

    if received == 0 {
        remove_temp(&temp_path).await;
        return Err(DownloadError::Empty.into());
    }

    if let Err(e) = tokio::fs::rename(&temp_path, final_path).await {
        remove_temp(&temp_path).await;
        return Err(DownloadError::RenameFailed {
            temp_path,
            reason: e.to_string(),
        }
        .into());
    }

    Ok(Artifact {
        file_path: final_path.to_path_buf(),
        size_bytes: received,
        sha256,
    })
}

async fn write_hashed<S, B, E>(
    stream: S,
    declared_len: Option<u64>,
    temp_path: &Path,
) -> Result<(u64, String)>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    Error: From<E>,
{
    futures::pin_mut!(stream);

    let mut file = tokio::fs::File::create(temp_path).await?;
    let mut hasher = Sha256::new();
    let mut received: u64 = 0;
    let mut next_report = 25;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let bytes = chunk.as_ref();
        if bytes.is_empty() {
            continue;
        }
        file.write_all(bytes).await?;
        hasher.update(bytes);
        received += bytes.len() as u64;

        if let Some(total) = declared_len.filter(|t| *t > 0) {
            let percent = received.saturating_mul(100) / total;
            if percent >= next_report {
                tracing::debug!(received, total, percent, "download progress");
                next_report = (percent / 25 + 1) * 25;
            }
        }
    }

    file.flush().await?;
    file.sync_all().await?;

    Ok((received, format!("{:x}", hasher.finalize())))
}

async fn remove_temp(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove temporary file");
    }
}

/// Fetches completed artifacts into the output directory
pub struct Downloader<'a> {
    client: &'a VideoClient,
    store: &'a MetadataStore,
    output_dir: &'a Path,
}

impl<'a> Downloader<'a> {
    /// Create a downloader
    pub fn new(client: &'a VideoClient, store: &'a MetadataStore, output_dir: &'a Path) -> Self {
        Self {
            client,
            store,
            output_dir,
        }
    }

    /// Final path of the artifact for `job`
    pub fn artifact_path(&self, job: &Job) -> PathBuf {
        self.output_dir
            .join(artifact_file_name(&job.id, job.created_at.timestamp()))
    }

    /// Single download attempt
    pub async fn download_once(&self, id: &JobId, final_path: &Path) -> Result<Artifact> {
        tracing::info!(job_id = %id, path = %final_path.display(), "downloading artifact");

        let response = self.client.get_content(id).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpStatus {
                status: status.as_u16(),
            }
            .into());
        }

        tokio::fs::create_dir_all(self.output_dir).await?;
        let declared_len = response.content_length();
        persist_stream(response.bytes_stream(), declared_len, final_path).await
    }

    /// Download the artifact of a `completed` job, retrying with backoff
    ///
    /// On success the job is `downloaded` with its artifact recorded; after the last
    /// failed attempt it is `download_failed`. Both outcomes are checkpointed.
    pub async fn download(&self, job: &mut Job, retry: &RetryConfig) -> Result<Artifact> {
        let id = job.id.clone();
        let final_path = self.artifact_path(job);
        let (id_ref, path_ref) = (&id, final_path.as_path());

        let result = download_with_retry(retry, move || self.download_once(id_ref, path_ref)).await;

        match result {
            Ok(artifact) => {
                job.mark_downloaded(artifact.clone());
                let mut fields = serde_json::Map::new();
                fields.insert("status".into(), serde_json::to_value(job.status)?);
                fields.insert("artifact".into(), serde_json::to_value(&job.artifact)?);
                fields.insert("last_error".into(), serde_json::Value::Null);
                fields.insert("updated_at".into(), serde_json::to_value(job.updated_at)?);
                self.store.upsert(&job.id, fields).await?;

                tracing::info!(
                    job_id = %job.id,
                    path = %artifact.file_path.display(),
                    size_bytes = artifact.size_bytes,
                    sha256 = %artifact.sha256,
                    "artifact saved"
                );
                Ok(artifact)
            }
            Err(failure) => {
                let last_error = failure.error.to_string();
                job.fail(JobStatus::DownloadFailed, last_error.clone());
                self.store.save(job).await?;

                Err(DownloadError::Exhausted {
                    id,
                    url: self.client.content_url(&job.id),
                    attempts: failure.attempts,
                    last_error,
                }
                .into())
            }
        }
    }
}
