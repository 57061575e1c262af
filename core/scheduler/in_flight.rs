use crate::cache::Artifact;
use crate::model::{Fingerprint, RuleId, RunStatus};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::watch;

/// What the rule that claimed a fingerprint ended up with.
#[derive(Debug, Clone)]
pub struct LeaderOutcome {
    pub rule: RuleId,
    pub status: RunStatus,
    /// The packed outputs, when the leader produced or restored them.
    pub artifact: Option<Artifact>,
}

type Slot = watch::Receiver<Option<LeaderOutcome>>;

pub enum Claim {
    Leader(Leader),
    Follower(Follower),
}

pub struct Leader {
    tx: watch::Sender<Option<LeaderOutcome>>,
}

impl Leader {
    pub fn publish(self, outcome: LeaderOutcome) {
        // Nobody listening is fine, the slot keeps the value for later followers.
        let _ = self.tx.send(Some(outcome));
    }
}

pub struct Follower {
    rx: Slot,
}

impl Follower {
    /// Waits for the leader's outcome. `None` means the leader went away without one.
    pub async fn outcome(mut self) -> Option<LeaderOutcome> {
        loop {
            if let Some(outcome) = self.rx.borrow().clone() {
                return Some(outcome);
            }
            if self.rx.changed().await.is_err() {
                return self.rx.borrow().clone();
            }
        }
    }
}

/// Fingerprints claimed during a run. The first rule to claim a fingerprint does the work, every
/// later rule with the same fingerprint waits for it and reuses its outcome.
///
#[derive(Debug, Default)]
pub struct InFlight {
    slots: Mutex<HashMap<Fingerprint, Slot>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&self, fingerprint: &Fingerprint) -> Claim {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(rx) = slots.get(fingerprint) {
            return Claim::Follower(Follower { rx: rx.clone() });
        }
        let (tx, rx) = watch::channel(None);
        slots.insert(fingerprint.clone(), rx);
        Claim::Leader(Leader { tx })
    }
}
