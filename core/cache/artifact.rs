use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::*;

/// A gzip-compressed tarball of a rule's outputs, with paths relative to the component root.
///
/// Artifacts are immutable: once packed they are only ever read back.
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    bytes: Vec<u8>,
}

impl Artifact {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_ref()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Packs `files` (relative to `root`) into a new artifact.
    #[tracing::instrument(name = "Artifact::pack", skip(files))]
    pub async fn pack(root: &Path, files: Vec<PathBuf>) -> Result<Self, ArtifactError> {
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let encoder = GzEncoder::new(Vec::new(), Compression::default());
            let mut tar = tar::Builder::new(encoder);
            for file in &files {
                tar.append_path_with_name(root.join(file), file)
                    .map_err(|err| ArtifactError::CouldNotPack {
                        path: root.join(file),
                        err,
                    })?;
            }
            let bytes = tar
                .into_inner()
                .and_then(|encoder| encoder.finish())
                .map_err(ArtifactError::CouldNotCompress)?;
            trace!("Packed {} files into {} bytes", files.len(), bytes.len());
            Ok(Self { bytes })
        })
        .await
        .map_err(|err| ArtifactError::Interrupted(err.to_string()))?
    }

    /// Unpacks the artifact into `root`, overwriting existing files. Restored files get fresh
    /// modification times.
    #[tracing::instrument(name = "Artifact::unpack", skip(self))]
    pub async fn unpack(&self, root: &Path) -> Result<(), ArtifactError> {
        let root = root.to_path_buf();
        let bytes = self.bytes.clone();
        tokio::task::spawn_blocking(move || {
            let mut archive = tar::Archive::new(GzDecoder::new(&*bytes));
            archive.set_preserve_mtime(false);
            archive.set_overwrite(true);
            archive
                .unpack(&root)
                .map_err(|err| ArtifactError::CouldNotUnpack { root, err })
        })
        .await
        .map_err(|err| ArtifactError::Interrupted(err.to_string()))?
    }
}

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Could not add {path:?} to the artifact: {err}")]
    CouldNotPack { path: PathBuf, err: std::io::Error },

    #[error("Could not compress the artifact: {0}")]
    CouldNotCompress(std::io::Error),

    #[error("Could not unpack the artifact into {root:?}: {err}")]
    CouldNotUnpack { root: PathBuf, err: std::io::Error },

    #[error("Archiving was interrupted: {0}")]
    Interrupted(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[tokio::test]
    async fn restores_packed_outputs_into_another_directory() {
        let src = assert_fs::TempDir::new().unwrap();
        src.child("bin/api").write_str("binary").unwrap();
        src.child("out.txt").write_str("hi\n").unwrap();

        let artifact = Artifact::pack(
            src.path(),
            vec![PathBuf::from("bin/api"), PathBuf::from("out.txt")],
        )
        .await
        .unwrap();

        let dst = assert_fs::TempDir::new().unwrap();
        dst.child("out.txt").write_str("stale").unwrap();
        artifact.unpack(dst.path()).await.unwrap();

        dst.child("bin/api").assert("binary");
        dst.child("out.txt").assert("hi\n");
    }

    #[tokio::test]
    async fn packing_missing_files_fails() {
        let src = assert_fs::TempDir::new().unwrap();
        let result = Artifact::pack(src.path(), vec![PathBuf::from("nope")]).await;
        assert_matches!(result, Err(ArtifactError::CouldNotPack { .. }));
    }

    #[tokio::test]
    async fn garbage_does_not_unpack() {
        let dst = assert_fs::TempDir::new().unwrap();
        let garbage = Artifact::from_bytes(b"not a tarball".to_vec());
        assert_matches!(
            garbage.unpack(dst.path()).await,
            Err(ArtifactError::CouldNotUnpack { .. })
        );
    }
}
