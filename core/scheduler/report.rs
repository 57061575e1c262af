use crate::model::{Fingerprint, RuleId, RunStatus, StatusDetail};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    Failure,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleReport {
    pub id: RuleId,
    pub status: RunStatus,
    pub detail: StatusDetail,
    pub fingerprint: Option<Fingerprint>,
    pub duration: Duration,
}

/// What happened to every rule of a run, in dispatch order.
///
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub rules: Vec<RuleReport>,
    /// Rules that were never dispatched, because of cancellation or an earlier failure.
    pub not_run: Vec<RuleId>,
    pub duration: Duration,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Success
    }

    pub fn rule(&self, id: &RuleId) -> Option<&RuleReport> {
        self.rules.iter().find(|r| &r.id == id)
    }

    pub fn status_of(&self, id: &RuleId) -> Option<RunStatus> {
        self.rule(id).map(|r| r.status)
    }

    pub fn count(&self, status: RunStatus) -> usize {
        self.rules.iter().filter(|r| r.status == status).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &RuleReport> {
        self.rules.iter().filter(|r| r.status.is_failure())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(id: &str, status: RunStatus) -> RuleReport {
        RuleReport {
            id: RuleId::new("c", id),
            status,
            detail: StatusDetail::Executed,
            fingerprint: None,
            duration: Duration::default(),
        }
    }

    #[test]
    fn counts_and_failures() {
        let run = RunReport {
            outcome: RunOutcome::Failure,
            rules: vec![
                report("a", RunStatus::Ok),
                report("b", RunStatus::ExecError),
                report("c", RunStatus::Ok),
            ],
            not_run: vec![],
            duration: Duration::default(),
        };
        assert!(!run.is_success());
        assert_eq!(run.count(RunStatus::Ok), 2);
        assert_eq!(
            run.failures().map(|r| r.id.to_string()).collect::<Vec<_>>(),
            vec!["c:b"]
        );
        assert_eq!(run.status_of(&RuleId::new("c", "c")), Some(RunStatus::Ok));
        assert_eq!(run.status_of(&RuleId::new("c", "z")), None);
    }
}
