//! # Layered Artifact Cache
//!
//! A local directory tier in front of a remote object store tier. Lookups go local first, then
//! remote (writing remote hits through to the local tier). Stores go to every tier the cache
//! mode allows.
//!
//! A failing tier only degrades the cache while another tier is configured. If it is the only
//! one, its errors are returned to the caller.
//!
mod artifact;
mod fingerprint;
mod local;
mod remote;

pub use artifact::*;
pub use fingerprint::*;
pub use local::*;
pub use remote::*;

use crate::config::CacheMode;
use crate::events::event::CacheEvent;
use crate::events::EventChannel;
use crate::model::{CacheTier, Fingerprint, RuleId};
use crate::store::ObjectStoreError;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::*;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Local cache failure at {path:?}: {err}")]
    Local { path: PathBuf, err: std::io::Error },

    #[error(transparent)]
    Remote(ObjectStoreError),

    #[error(transparent)]
    Artifact(ArtifactError),

    #[error("Cache operation was interrupted: {0}")]
    Interrupted(String),
}

impl From<ObjectStoreError> for CacheError {
    fn from(err: ObjectStoreError) -> Self {
        CacheError::Remote(err)
    }
}

impl From<ArtifactError> for CacheError {
    fn from(err: ArtifactError) -> Self {
        CacheError::Artifact(err)
    }
}

/// Which tiers received an artifact.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StoreOutcome {
    pub local: bool,
    pub remote: bool,
}

#[derive(Debug, Clone)]
pub struct CacheManager {
    local: Option<LocalCache>,
    remote: Option<RemoteCache>,
    mode: CacheMode,
    event_channel: Arc<EventChannel>,
}

impl CacheManager {
    pub fn new(
        local: Option<LocalCache>,
        remote: Option<RemoteCache>,
        mode: CacheMode,
        event_channel: Arc<EventChannel>,
    ) -> Self {
        Self {
            local,
            remote,
            mode,
            event_channel,
        }
    }

    pub fn mode(&self) -> CacheMode {
        self.mode
    }

    #[tracing::instrument(name = "CacheManager::lookup", skip(self))]
    pub async fn lookup(
        &self,
        rule: &RuleId,
        fingerprint: &Fingerprint,
    ) -> Result<Option<(Artifact, CacheTier)>, CacheError> {
        if !self.mode.reads() {
            return Ok(None);
        }

        if let Some(local) = &self.local {
            match local.get(fingerprint).await {
                Ok(Some(artifact)) => {
                    self.hit(rule, fingerprint, CacheTier::Local);
                    return Ok(Some((artifact, CacheTier::Local)));
                }
                Ok(None) => (),
                Err(err) => self.tier_failed(CacheTier::Local, err)?,
            }
        }

        if let Some(remote) = &self.remote {
            match remote.get(fingerprint).await {
                Ok(Some(artifact)) => {
                    if let Some(local) = &self.local {
                        if let Err(err) = local.put(fingerprint, &artifact).await {
                            self.warn(CacheTier::Local, &err);
                        }
                    }
                    self.hit(rule, fingerprint, CacheTier::Remote);
                    return Ok(Some((artifact, CacheTier::Remote)));
                }
                Ok(None) => (),
                Err(err) => self.tier_failed(CacheTier::Remote, err)?,
            }
        }

        Ok(None)
    }

    #[tracing::instrument(name = "CacheManager::store", skip(self, artifact))]
    pub async fn store(
        &self,
        rule: &RuleId,
        fingerprint: &Fingerprint,
        artifact: &Artifact,
    ) -> Result<StoreOutcome, CacheError> {
        let mut outcome = StoreOutcome::default();
        if !self.mode.reads() {
            return Ok(outcome);
        }

        if let Some(local) = &self.local {
            match local.put(fingerprint, artifact).await {
                Ok(()) => {
                    outcome.local = true;
                    self.stored(rule, fingerprint, CacheTier::Local);
                }
                Err(err) => self.tier_failed(CacheTier::Local, err)?,
            }
        }

        if let Some(remote) = self.remote.as_ref().filter(|_| self.mode.writes_remote()) {
            match remote.put(fingerprint, artifact).await {
                Ok(()) => {
                    outcome.remote = true;
                    self.stored(rule, fingerprint, CacheTier::Remote);
                }
                Err(err) => self.tier_failed(CacheTier::Remote, err)?,
            }
        }

        Ok(outcome)
    }

    /// Gives up on an artifact that was found in `tier` but could not be restored. The local copy
    /// is removed so the next lookup misses, and a warning is sent.
    #[tracing::instrument(name = "CacheManager::discard", skip(self, err))]
    pub async fn discard(
        &self,
        rule: &RuleId,
        fingerprint: &Fingerprint,
        tier: CacheTier,
        err: &CacheError,
    ) {
        warn!("Ignoring the unusable {} artifact of {}: {}", tier, rule, err);
        self.event_channel.send(CacheEvent::CacheWarning {
            tier,
            message: format!("unusable artifact for {}: {}", rule, err),
        });

        if let Some(local) = &self.local {
            if let Err(err) = local.remove(fingerprint).await {
                self.warn(CacheTier::Local, &err);
            }
        }
    }

    fn has_other_tier(&self, tier: CacheTier) -> bool {
        match tier {
            CacheTier::Local => self.remote.is_some(),
            CacheTier::Remote => self.local.is_some(),
        }
    }

    fn tier_failed(&self, tier: CacheTier, err: CacheError) -> Result<(), CacheError> {
        if self.has_other_tier(tier) {
            self.warn(tier, &err);
            Ok(())
        } else {
            Err(err)
        }
    }

    fn warn(&self, tier: CacheTier, err: &CacheError) {
        warn!("The {} cache failed, continuing without it: {}", tier, err);
        self.event_channel.send(CacheEvent::CacheWarning {
            tier,
            message: err.to_string(),
        });
    }

    fn hit(&self, rule: &RuleId, fingerprint: &Fingerprint, tier: CacheTier) {
        debug!("Cache hit for {} in the {} cache", rule, tier);
        self.event_channel.send(CacheEvent::CacheHit {
            rule: rule.clone(),
            fingerprint: fingerprint.clone(),
            tier,
        });
    }

    fn stored(&self, rule: &RuleId, fingerprint: &Fingerprint, tier: CacheTier) {
        self.event_channel.send(CacheEvent::ArtifactStored {
            rule: rule.clone(),
            fingerprint: fingerprint.clone(),
            tier,
        });
    }
}
