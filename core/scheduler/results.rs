use crate::graph::RuleIdx;
use crate::model::{Fingerprint, RunStatus, StatusDetail};
use dashmap::DashMap;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleResult {
    pub status: RunStatus,
    pub detail: StatusDetail,
    pub fingerprint: Option<Fingerprint>,
    pub duration: Duration,
}

impl RuleResult {
    pub fn new(status: RunStatus, detail: StatusDetail) -> Self {
        Self {
            status,
            detail,
            fingerprint: None,
            duration: Duration::default(),
        }
    }

    pub fn error(detail: StatusDetail) -> Self {
        Self::new(RunStatus::Error, detail)
    }

    pub fn with_fingerprint(mut self, fingerprint: &Fingerprint) -> Self {
        self.fingerprint = Some(fingerprint.clone());
        self
    }
}

/// Terminal results of the rules of a single run.
#[derive(Debug, Default)]
pub struct RuleResults {
    results: DashMap<RuleIdx, RuleResult>,
}

impl RuleResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, idx: RuleIdx, result: RuleResult) {
        self.results.insert(idx, result);
    }

    pub fn get(&self, idx: RuleIdx) -> Option<RuleResult> {
        self.results.get(&idx).map(|r| r.value().clone())
    }

    pub fn has_failures(&self) -> bool {
        self.results.iter().any(|r| r.value().status.is_failure())
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
