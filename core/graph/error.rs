use crate::config::ConfigError;
use crate::model::RuleId;
use thiserror::*;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error(transparent)]
    Config(ConfigError),

    #[error("Rule {rule} depends on {dependency}, but no such rule exists")]
    UnresolvedDependency { rule: RuleId, dependency: RuleId },

    #[error("Found a dependency cycle between the rules: {}", .rules.iter().map(|r| r.to_string()).collect::<Vec<String>>().join(", "))]
    Cycle { rules: Vec<RuleId> },

    #[error("No rule matches {0:?}")]
    UnknownRule(String),
}

impl From<ConfigError> for GraphError {
    fn from(err: ConfigError) -> Self {
        GraphError::Config(err)
    }
}
