use super::RuleId;
use serde::{Deserialize, Serialize};

/// The terminal status of a rule in a run.
///
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum RunStatus {
    /// The rule could not run, either because a dependency failed or because something outside
    /// the command itself broke (eg. the command could not be launched).
    Error,

    /// Nothing had to be done, the previous outputs are still valid or the rule's conditions
    /// were not met.
    UpToDate,

    /// The outputs were restored from a cache tier.
    Cached,

    /// The command ran and produced every declared output.
    #[serde(rename = "OK")]
    Ok,

    /// The command ran and exited with a non-zero status.
    ExecError,

    /// The command succeeded but a declared output was not produced.
    MissingOutputError,
}

impl RunStatus {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            RunStatus::Error | RunStatus::ExecError | RunStatus::MissingOutputError
        )
    }

    pub fn is_success(&self) -> bool {
        !self.is_failure()
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunStatus::Error => "Error",
            RunStatus::UpToDate => "UpToDate",
            RunStatus::Cached => "Cached",
            RunStatus::Ok => "OK",
            RunStatus::ExecError => "ExecError",
            RunStatus::MissingOutputError => "MissingOutputError",
        };
        f.write_str(name)
    }
}

/// Where a cached artifact was found.
///
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum CacheTier {
    Local,
    Remote,
}

impl std::fmt::Display for CacheTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheTier::Local => f.write_str("local"),
            CacheTier::Remote => f.write_str("remote"),
        }
    }
}

/// Why a rule ended up with its `RunStatus`.
///
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum StatusDetail {
    Executed,
    ConditionNotMet,
    OutputsUnchanged,
    Restored(CacheTier),
    Deduplicated { leader: RuleId },
    DependencyFailed(RuleId),
    MissingOutputs(Vec<String>),
    Failed(String),
    Cancelled,
}

impl std::fmt::Display for StatusDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusDetail::Executed => f.write_str("executed"),
            StatusDetail::ConditionNotMet => f.write_str("conditions not met"),
            StatusDetail::OutputsUnchanged => f.write_str("outputs unchanged"),
            StatusDetail::Restored(tier) => write!(f, "restored from {} cache", tier),
            StatusDetail::Deduplicated { leader } => write!(f, "shared with {}", leader),
            StatusDetail::DependencyFailed(dep) => write!(f, "dependency {} failed", dep),
            StatusDetail::MissingOutputs(patterns) => {
                write!(f, "missing outputs: {}", patterns.join(", "))
            }
            StatusDetail::Failed(reason) => f.write_str(reason),
            StatusDetail::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_statuses() {
        assert!(RunStatus::Error.is_failure());
        assert!(RunStatus::ExecError.is_failure());
        assert!(RunStatus::MissingOutputError.is_failure());
        assert!(RunStatus::Ok.is_success());
        assert!(RunStatus::Cached.is_success());
        assert!(RunStatus::UpToDate.is_success());
    }

    #[test]
    fn ok_is_displayed_in_upper_case() {
        assert_eq!(RunStatus::Ok.to_string(), "OK");
        assert_eq!(serde_json::to_string(&RunStatus::Ok).unwrap(), "\"OK\"");
    }
}
