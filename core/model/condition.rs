use serde::{Deserialize, Serialize};

/// A guard attached to a rule, deciding whether the rule runs at all.
///
/// In a manifest this is written as a single-key object, eg. `{ "resource_exists": "*.proto" }`
/// or `{ "script_succeeds": "test -f .skip" }`.
///
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// True iff the pattern matches at least one file relative to the owning component.
    ResourceExists(String),

    /// True iff the command exits with status zero.
    ScriptSucceeds(String),
}

impl Condition {
    pub fn value(&self) -> &str {
        match self {
            Condition::ResourceExists(pattern) => pattern,
            Condition::ScriptSucceeds(script) => script,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_tagged_manifest_form() {
        let when: Condition = serde_json::from_str(r#"{"resource_exists": "Dockerfile"}"#).unwrap();
        assert_eq!(when, Condition::ResourceExists("Dockerfile".into()));

        let unless: Condition =
            serde_json::from_str(r#"{"script_succeeds": "test -f .skip"}"#).unwrap();
        assert_eq!(unless.value(), "test -f .skip");
    }

    #[test]
    fn rejects_unknown_condition_kinds() {
        let parsed: Result<Condition, _> = serde_json::from_str(r#"{"file_exists": "x"}"#);
        assert!(parsed.is_err());
    }
}
