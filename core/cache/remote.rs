use super::{Artifact, CacheError};
use crate::model::Fingerprint;
use crate::store::ObjectStore;
use std::sync::Arc;

/// The remote cache tier, stored as `<prefix>/<fingerprint>.tar.gz` objects.
///
#[derive(Debug, Clone)]
pub struct RemoteCache {
    store: Arc<dyn ObjectStore>,
    prefix: Option<String>,
}

impl RemoteCache {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: Option<String>) -> Self {
        let prefix = prefix
            .map(|p| p.trim_matches('/').to_string())
            .filter(|p| !p.is_empty());
        Self { store, prefix }
    }

    pub fn key(&self, fingerprint: &Fingerprint) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix, fingerprint.artifact_name()),
            None => fingerprint.artifact_name(),
        }
    }

    #[tracing::instrument(name = "RemoteCache::get", skip(self))]
    pub async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<Artifact>, CacheError> {
        let blob = self.store.get(&self.key(fingerprint)).await?;
        Ok(blob.map(Artifact::from_bytes))
    }

    #[tracing::instrument(name = "RemoteCache::put", skip(self, artifact))]
    pub async fn put(&self, fingerprint: &Fingerprint, artifact: &Artifact) -> Result<(), CacheError> {
        self.store
            .put(&self.key(fingerprint), artifact.as_bytes().to_vec())
            .await?;
        Ok(())
    }
}
