use crate::model::{CacheTier, Fingerprint, RuleId, RunStatus, StatusDetail};
use std::time::Instant;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheEvent {
    CacheHit {
        rule: RuleId,
        fingerprint: Fingerprint,
        tier: CacheTier,
    },
    ArtifactStored {
        rule: RuleId,
        fingerprint: Fingerprint,
        tier: CacheTier,
    },
    /// A cache tier failed but another one could take over.
    CacheWarning { tier: CacheTier, message: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleEvent {
    RuleStarted {
        rule: RuleId,
    },
    RuleExecuting {
        rule: RuleId,
        image: Option<String>,
    },
    RuleCompleted {
        rule: RuleId,
        status: RunStatus,
        detail: StatusDetail,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkflowEvent {
    RunStarted {
        at: Instant,
        rule_count: usize,
    },
    RunCompleted(Instant),
    Cancelled,
}

impl WorkflowEvent {
    pub(crate) fn run_started(rule_count: usize) -> Self {
        Self::RunStarted {
            at: Instant::now(),
            rule_count,
        }
    }

    pub(crate) fn run_completed() -> Self {
        Self::RunCompleted(Instant::now())
    }
}

#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// The "nothing happened" event.
    #[default]
    Noop,
    CacheEvent(CacheEvent),
    RuleEvent(RuleEvent),
    WorkflowEvent(WorkflowEvent),
}

impl From<CacheEvent> for Event {
    fn from(value: CacheEvent) -> Self {
        Event::CacheEvent(value)
    }
}

impl From<RuleEvent> for Event {
    fn from(value: RuleEvent) -> Self {
        Event::RuleEvent(value)
    }
}

impl From<WorkflowEvent> for Event {
    fn from(value: WorkflowEvent) -> Self {
        Event::WorkflowEvent(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl quickcheck::Arbitrary for Event {
        fn arbitrary(g: &mut quickcheck::Gen) -> Self {
            let rule = RuleId::new(
                format!("c{}", u8::arbitrary(g)),
                format!("r{}", u8::arbitrary(g)),
            );
            let started = RuleEvent::RuleStarted { rule: rule.clone() };
            let completed = RuleEvent::RuleCompleted {
                rule,
                status: *g
                    .choose(&[RunStatus::Ok, RunStatus::Cached, RunStatus::ExecError])
                    .unwrap(),
                detail: StatusDetail::Executed,
            };
            let warning = CacheEvent::CacheWarning {
                tier: CacheTier::Remote,
                message: String::arbitrary(g),
            };

            g.choose(&[
                Self::Noop,
                started.into(),
                completed.into(),
                warning.into(),
            ])
            .unwrap()
            .clone()
        }
    }
}
