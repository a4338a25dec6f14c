//! Job checkpoint persistence
//!
//! One pretty-printed JSON record per job under the metadata directory, named
//! `<job id>.json`. Records are rewritten in full on every update and never deleted.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{Job, JobId};

/// Durable key-value checkpoint of job state
#[derive(Clone, Debug)]
pub struct MetadataStore {
    dir: PathBuf,
}

impl MetadataStore {
    /// Create a store rooted at `dir`; the directory is created on first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the records
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record for `id`
    ///
    /// Identifiers that could escape the metadata directory are rejected.
    pub fn record_path(&self, id: &JobId) -> Result<PathBuf> {
        validate_job_id(id)?;
        Ok(self.dir.join(format!("{id}.json")))
    }

    /// Merge `fields` into the record for `id`, creating it if absent
    ///
    /// Keys present in `fields` replace the stored values; other stored keys are kept.
    /// Applying the same update twice leaves the same record as applying it once.
    pub async fn upsert(&self, id: &JobId, fields: Map<String, Value>) -> Result<PathBuf> {
        let path = self.record_path(id)?;
        let mut record = self.read_record(&path).await?.unwrap_or_default();
        for (key, value) in fields {
            record.insert(key, value);
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let body = serde_json::to_vec_pretty(&Value::Object(record))?;
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, body).await?;
        tokio::fs::rename(&temp_path, &path).await?;

        tracing::debug!(job_id = %id, path = %path.display(), "checkpoint written");
        Ok(path)
    }

    /// Checkpoint every field of `job`
    pub async fn save(&self, job: &Job) -> Result<PathBuf> {
        match serde_json::to_value(job)? {
            Value::Object(fields) => self.upsert(&job.id, fields).await,
            // Job always serializes to a JSON object
            other => Err(Error::Serialization(serde::de::Error::custom(format!(
                "job serialized to non-object value: {other}"
            )))),
        }
    }

    /// Load the record for `id`, if one exists
    pub async fn load(&self, id: &JobId) -> Result<Option<Job>> {
        let path = self.record_path(id)?;
        match self.read_record(&path).await? {
            Some(record) => Ok(Some(serde_json::from_value(Value::Object(record))?)),
            None => Ok(None),
        }
    }

    /// Load the record for `id`, failing with [`Error::JobNotFound`] if there is none
    pub async fn require(&self, id: &JobId) -> Result<Job> {
        self.load(id).await?.ok_or_else(|| Error::JobNotFound {
            id: id.clone(),
            dir: self.dir.clone(),
        })
    }

    async fn read_record(&self, path: &Path) -> Result<Option<Map<String, Value>>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&bytes)? {
            Value::Object(record) => Ok(Some(record)),
            _ => Err(Error::Serialization(serde::de::Error::custom(format!(
                "record {} is not a JSON object",
                path.display()
            )))),
        }
    }
}

fn validate_job_id(id: &JobId) -> Result<()> {
    let raw = id.as_str();
    let invalid = raw.is_empty()
        || raw.contains("..")
        || raw.contains(['/', '\\', '\0'])
        || raw.trim() != raw;
    if invalid {
        return Err(Error::InvalidJobId(raw.to_string()));
    }
    Ok(())
}
