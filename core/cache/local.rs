use super::{Artifact, CacheError};
use crate::model::Fingerprint;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::*;

/// The local cache tier: one file per fingerprint under `<root>/artifacts`.
///
/// Writes are staged in `<root>/tmp` and renamed into place, so readers only ever see complete
/// artifacts and concurrent writers of the same fingerprint simply replace each other.
///
#[derive(Debug, Clone)]
pub struct LocalCache {
    root: PathBuf,
}

impl LocalCache {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn artifact_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.root.join("artifacts").join(fingerprint.artifact_name())
    }

    #[tracing::instrument(name = "LocalCache::get", skip(self))]
    pub async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<Artifact>, CacheError> {
        let path = self.artifact_path(fingerprint);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(Artifact::from_bytes(bytes))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(CacheError::Local { path, err }),
        }
    }

    /// Removes the artifact of `fingerprint`, if there is one.
    #[tracing::instrument(name = "LocalCache::remove", skip(self))]
    pub async fn remove(&self, fingerprint: &Fingerprint) -> Result<(), CacheError> {
        let path = self.artifact_path(fingerprint);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(CacheError::Local { path, err }),
        }
    }

    #[tracing::instrument(name = "LocalCache::put", skip(self, artifact))]
    pub async fn put(&self, fingerprint: &Fingerprint, artifact: &Artifact) -> Result<(), CacheError> {
        let final_path = self.artifact_path(fingerprint);
        let tmp_root = self.root.join("tmp");
        let bytes = artifact.as_bytes().to_vec();

        tokio::task::spawn_blocking(move || {
            let local_err = |path: &Path, err: std::io::Error| CacheError::Local {
                path: path.to_path_buf(),
                err,
            };

            for dir in [tmp_root.as_path(), final_path.parent().unwrap_or(tmp_root.as_path())] {
                std::fs::create_dir_all(dir).map_err(|err| local_err(dir, err))?;
            }

            let mut staged =
                tempfile::NamedTempFile::new_in(&tmp_root).map_err(|err| local_err(&tmp_root, err))?;
            staged
                .write_all(&bytes)
                .and_then(|_| staged.flush())
                .map_err(|err| local_err(staged.path(), err))?;
            staged
                .persist(&final_path)
                .map_err(|err| local_err(&final_path, err.error))?;

            trace!("Stored artifact at {:?}", final_path);
            Ok(())
        })
        .await
        .map_err(|err| CacheError::Interrupted(err.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn misses_then_hits_after_a_put() {
        let root = assert_fs::TempDir::new().unwrap();
        let cache = LocalCache::new(root.path());
        let fp = Fingerprint::from_hex("abc123");

        assert_matches!(cache.get(&fp).await, Ok(None));

        let artifact = Artifact::from_bytes(b"tarball".to_vec());
        cache.put(&fp, &artifact).await.unwrap();
        assert_eq!(cache.get(&fp).await.unwrap(), Some(artifact));
        assert!(root.path().join("artifacts/abc123.tar.gz").exists());
    }

    #[tokio::test]
    async fn concurrent_writers_of_the_same_fingerprint_are_idempotent() {
        let root = assert_fs::TempDir::new().unwrap();
        let cache = LocalCache::new(root.path());
        let fp = Fingerprint::from_hex("same");
        let artifact = Artifact::from_bytes(b"identical".to_vec());

        let writes = (0..8).map(|_| cache.put(&fp, &artifact));
        for result in futures::future::join_all(writes).await {
            result.unwrap();
        }

        assert_eq!(cache.get(&fp).await.unwrap(), Some(artifact));
        let staged = std::fs::read_dir(root.path().join("tmp")).unwrap().count();
        assert_eq!(staged, 0);
    }

    #[tokio::test]
    async fn removing_is_idempotent() {
        let root = assert_fs::TempDir::new().unwrap();
        let cache = LocalCache::new(root.path());
        let fp = Fingerprint::from_hex("gone");
        cache.put(&fp, &Artifact::from_bytes(b"x".to_vec())).await.unwrap();

        cache.remove(&fp).await.unwrap();
        cache.remove(&fp).await.unwrap();
        assert_matches!(cache.get(&fp).await, Ok(None));
    }
}
