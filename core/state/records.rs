use crate::cache::hash_file;
use crate::model::{Fingerprint, Rule, RuleId};
use crate::util::paths::{self, PathError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::*;

/// What a rule looked like the last time it completed successfully.
///
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub rule: RuleId,
    pub fingerprint: Fingerprint,

    /// Content hashes of every output file, keyed by their path relative to the component.
    pub outputs: BTreeMap<String, String>,

    #[serde(with = "crate::util::serde::iso8601")]
    pub recorded_at: DateTime<Utc>,
}

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Could not access run record {path:?}: {err}")]
    Io { path: PathBuf, err: std::io::Error },

    #[error("Malformed run record {path:?}: {err}")]
    Malformed {
        path: PathBuf,
        err: serde_json::Error,
    },

    #[error(transparent)]
    Outputs(PathError),
}

impl From<PathError> for RecordError {
    fn from(err: PathError) -> Self {
        RecordError::Outputs(err)
    }
}

/// Per-rule records of the last successful run, kept under `<root>/records`.
///
/// They let a rule be reported `UpToDate` when neither its fingerprint nor its outputs changed,
/// without going through any cache tier.
///
#[derive(Debug, Clone)]
pub struct RunRecords {
    root: PathBuf,
}

impl RunRecords {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self, rule: &RuleId) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(rule.to_string().as_bytes());
        self.root
            .join("records")
            .join(format!("{:x}.json", hasher.finalize()))
    }

    #[tracing::instrument(name = "RunRecords::load", skip(self))]
    pub async fn load(&self, rule: &RuleId) -> Result<Option<RunRecord>, RecordError> {
        let path = self.path(rule);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(RecordError::Io { path, err }),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|err| RecordError::Malformed { path, err })
    }

    #[tracing::instrument(name = "RunRecords::save", skip(self, record), fields(rule = %record.rule))]
    pub async fn save(&self, record: &RunRecord) -> Result<(), RecordError> {
        let path = self.path(&record.rule);
        let json = serde_json::to_vec_pretty(record).map_err(|err| RecordError::Malformed {
            path: path.clone(),
            err,
        })?;

        let io_err = |path: &Path, err: std::io::Error| RecordError::Io {
            path: path.to_path_buf(),
            err,
        };

        let dir = self.root.join("records");
        std::fs::create_dir_all(&dir).map_err(|err| io_err(&dir, err))?;
        let mut staged = tempfile::NamedTempFile::new_in(&dir).map_err(|err| io_err(&dir, err))?;
        staged
            .write_all(&json)
            .map_err(|err| io_err(staged.path(), err))?;
        staged
            .persist(&path)
            .map_err(|err| io_err(&path, err.error))?;
        Ok(())
    }

    /// Captures the current state of the rule's outputs.
    pub fn capture(&self, rule: &Rule, fingerprint: &Fingerprint) -> Result<RunRecord, RecordError> {
        Ok(RunRecord {
            rule: rule.id().clone(),
            fingerprint: fingerprint.clone(),
            outputs: hash_outputs(rule)?,
            recorded_at: Utc::now(),
        })
    }

    /// Whether the last successful run had this fingerprint and left outputs that are still
    /// intact on disk.
    #[tracing::instrument(name = "RunRecords::is_up_to_date", skip(self, rule), fields(rule = %rule.id()))]
    pub async fn is_up_to_date(
        &self,
        rule: &Rule,
        fingerprint: &Fingerprint,
    ) -> Result<bool, RecordError> {
        let record = match self.load(rule.id()).await? {
            Some(record) if &record.fingerprint == fingerprint => record,
            _ => return Ok(false),
        };

        for pattern in rule.outputs() {
            if !paths::matches_any(rule.dir(), pattern)? {
                debug!("Output {:?} is gone", pattern);
                return Ok(false);
            }
        }

        let current = hash_outputs(rule)?;
        Ok(current == record.outputs)
    }
}

fn hash_outputs(rule: &Rule) -> Result<BTreeMap<String, String>, RecordError> {
    let mut outputs = BTreeMap::new();
    for file in paths::expand_files(rule.dir(), rule.outputs())? {
        let path = rule.dir().join(&file);
        let digest = hash_file(&path).map_err(|err| RecordError::Io { path, err })?;
        outputs.insert(file.to_string_lossy().to_string(), digest);
    }
    Ok(outputs)
}
