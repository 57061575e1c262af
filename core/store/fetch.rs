use super::{ObjectStore, ObjectStoreError};
use crate::cache::{Artifact, ArtifactError};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::*;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("object store is not configured")]
    NotConfigured,

    #[error("Failed to fetch source from {key}: {reason}")]
    Failed { key: String, reason: String },

    #[error("Object {0:?} does not exist")]
    NotFound(String),

    #[error(transparent)]
    Store(ObjectStoreError),

    #[error(transparent)]
    Archive(ArtifactError),

    #[error("Could not create a workspace for the source: {0}")]
    CouldNotCreateWorkspace(std::io::Error),

    #[error("Download was cancelled")]
    Cancelled,
}

impl From<ObjectStoreError> for FetchError {
    fn from(err: ObjectStoreError) -> Self {
        FetchError::Store(err)
    }
}

impl From<ArtifactError> for FetchError {
    fn from(err: ArtifactError) -> Self {
        FetchError::Archive(err)
    }
}

/// Downloads the gzipped tarball stored at `key` and extracts it into `dest`.
///
#[tracing::instrument(name = "store::download_extract_archive", skip(store, cancel))]
pub async fn download_extract_archive(
    store: &dyn ObjectStore,
    dest: &Path,
    key: &str,
    cancel: &CancellationToken,
) -> Result<(), FetchError> {
    let blob = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(FetchError::Cancelled),
        blob = store.get(key) => blob?,
    };
    let blob = blob.ok_or_else(|| FetchError::NotFound(key.to_string()))?;
    debug!("Downloaded {} bytes from {}", blob.len(), store.describe());
    Artifact::from_bytes(blob).unpack(dest).await?;
    Ok(())
}

/// A source snapshot extracted into a fresh temporary directory. The directory is removed when
/// this value is dropped.
///
#[derive(Debug)]
pub struct SourceWorkspace {
    dir: tempfile::TempDir,
}

impl SourceWorkspace {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Keeps the directory around after this value is dropped.
    pub fn into_path(self) -> PathBuf {
        self.dir.into_path()
    }
}

/// Downloads a source snapshot (eg. one uploaded by CI) and extracts it into a new temporary
/// workspace to build from.
///
pub async fn download_source(
    store: Option<&dyn ObjectStore>,
    key: &str,
    cancel: &CancellationToken,
) -> Result<SourceWorkspace, FetchError> {
    let store = store.ok_or(FetchError::NotConfigured)?;

    let dir = tempfile::Builder::new()
        .prefix("strata")
        .tempdir()
        .map_err(FetchError::CouldNotCreateWorkspace)?;

    download_extract_archive(store, dir.path(), key, cancel)
        .await
        .map_err(|err| match err {
            FetchError::Cancelled => FetchError::Cancelled,
            err => FetchError::Failed {
                key: key.to_string(),
                reason: err.to_string(),
            },
        })?;

    Ok(SourceWorkspace { dir })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryObjectStore;
    use assert_fs::prelude::*;

    #[tokio::test]
    async fn sources_are_extracted_into_a_fresh_workspace() {
        let src = assert_fs::TempDir::new().unwrap();
        src.child("api/component.json").write_str("{}").unwrap();
        let snapshot = Artifact::pack(src.path(), vec![PathBuf::from("api/component.json")])
            .await
            .unwrap();

        let store = MemoryObjectStore::new();
        store
            .put("sources/abc.tar.gz", snapshot.into_bytes())
            .await
            .unwrap();

        let workspace = download_source(
            Some(&store as &dyn ObjectStore),
            "sources/abc.tar.gz",
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(workspace.path().join("api/component.json").exists());
        assert!(workspace
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("strata"));
    }

    #[tokio::test]
    async fn a_missing_store_is_reported() {
        let result = download_source(None, "sources/abc.tar.gz", &CancellationToken::new()).await;
        assert_matches!(result, Err(FetchError::NotConfigured));
        assert_eq!(
            FetchError::NotConfigured.to_string(),
            "object store is not configured"
        );
    }

    #[tokio::test]
    async fn missing_objects_are_wrapped_with_their_key() {
        let store = MemoryObjectStore::new();
        let result = download_source(
            Some(&store as &dyn ObjectStore),
            "nope.tar.gz",
            &CancellationToken::new(),
        )
        .await;
        assert_matches!(result, Err(FetchError::Failed { key, .. }) if key == "nope.tar.gz");
    }

    #[tokio::test]
    async fn cancelled_downloads_are_not_wrapped() {
        let store = MemoryObjectStore::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let dest = assert_fs::TempDir::new().unwrap();
        let result = download_extract_archive(&store, dest.path(), "abc.tar.gz", &cancel).await;
        assert_matches!(result, Err(FetchError::Cancelled));
    }
}
