use serde::{Deserialize, Serialize};
use thiserror::*;

/// A process-wide unique identifier for a rule, written `component:rule`.
///
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RuleId {
    component: String,
    rule: String,
}

impl RuleId {
    pub fn new<C, R>(component: C, rule: R) -> Self
    where
        C: Into<String>,
        R: Into<String>,
    {
        Self {
            component: component.into(),
            rule: rule.into(),
        }
    }

    /// Parse a dependency reference as written in a manifest. References without a component
    /// part point to a rule in `current_component`.
    pub fn parse_reference(reference: &str, current_component: &str) -> Result<Self, RuleIdError> {
        match reference.split_once(':') {
            Some((component, rule)) => {
                if component.is_empty() || rule.is_empty() || rule.contains(':') {
                    return Err(RuleIdError::Malformed(reference.to_string()));
                }
                Ok(Self::new(component, rule))
            }
            None if reference.is_empty() => Err(RuleIdError::Malformed(reference.to_string())),
            None => Ok(Self::new(current_component, reference)),
        }
    }

    pub fn component(&self) -> &str {
        self.component.as_ref()
    }

    pub fn rule(&self) -> &str {
        self.rule.as_ref()
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.component, self.rule)
    }
}

impl TryFrom<String> for RuleId {
    type Error = RuleIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.split_once(':') {
            Some((component, _)) => Self::parse_reference(&value, component),
            None => Err(RuleIdError::Malformed(value)),
        }
    }
}

impl From<RuleId> for String {
    fn from(id: RuleId) -> Self {
        id.to_string()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleIdError {
    #[error("Malformed rule reference {0:?}, expected `component:rule` or `rule`")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_references_resolve_to_the_current_component() {
        let id = RuleId::parse_reference("build", "api").unwrap();
        assert_eq!(id, RuleId::new("api", "build"));
        assert_eq!(id.to_string(), "api:build");
    }

    #[test]
    fn qualified_references_keep_their_component() {
        let id = RuleId::parse_reference("lib:gen", "api").unwrap();
        assert_eq!(id.component(), "lib");
        assert_eq!(id.rule(), "gen");
    }

    #[test]
    fn malformed_references_are_rejected() {
        assert_matches!(RuleId::parse_reference("", "api"), Err(RuleIdError::Malformed(_)));
        assert_matches!(RuleId::parse_reference(":x", "api"), Err(RuleIdError::Malformed(_)));
        assert_matches!(RuleId::parse_reference("a:b:c", "api"), Err(RuleIdError::Malformed(_)));
    }

    #[test]
    fn serializes_as_a_single_string() {
        let id = RuleId::new("api", "test");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"api:test\"");
        let back: RuleId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
