use crate::model::Rule;
use std::path::Path;

/// Filters narrowing down which rules a run should build. Every non-empty filter must match for
/// a rule to be selected, and dependencies of selected rules are always pulled in.
///
/// An empty selection selects every rule.
///
#[derive(Builder, Default, Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Component names. Paths are accepted and reduced to their last segment.
    #[builder(setter(into), default)]
    components: Vec<String>,

    #[builder(setter(into), default)]
    kinds: Vec<String>,

    /// Rule names (eg. `build`) or full identifiers (eg. `api:build`).
    #[builder(setter(into), default)]
    rules: Vec<String>,
}

impl Selection {
    pub fn builder() -> SelectionBuilder {
        SelectionBuilder::default()
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty() && self.kinds.is_empty() && self.rules.is_empty()
    }

    pub fn rules(&self) -> &[String] {
        self.rules.as_ref()
    }

    pub fn matches(&self, rule: &Rule) -> bool {
        let component_matches = self.components.is_empty()
            || self
                .components
                .iter()
                .any(|c| component_name(c) == rule.component().name());

        let kind_matches = self.kinds.is_empty()
            || rule
                .kind()
                .map(|kind| self.kinds.iter().any(|k| k == kind))
                .unwrap_or(false);

        let rule_matches =
            self.rules.is_empty() || self.rules.iter().any(|r| rule_filter_matches(r, rule));

        component_matches && kind_matches && rule_matches
    }
}

pub(crate) fn rule_filter_matches(filter: &str, rule: &Rule) -> bool {
    filter == rule.name() || filter == rule.id().to_string()
}

fn component_name(filter: &str) -> &str {
    Path::new(filter)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Component, RuleId};
    use std::sync::Arc;

    fn rule(component: &str, name: &str, kind: Option<&str>) -> Rule {
        let component = Arc::new(
            Component::builder()
                .name(component)
                .root(format!("/repo/{}", component))
                .kind(kind.map(String::from))
                .build()
                .unwrap(),
        );
        Rule::builder()
            .id(RuleId::new(component.name(), name))
            .component(component)
            .command("true")
            .build()
            .unwrap()
    }

    #[test]
    fn empty_selection_matches_everything() {
        assert!(Selection::all().matches(&rule("api", "build", None)));
    }

    #[test]
    fn component_paths_are_reduced_to_names() {
        let selection = Selection::builder()
            .components(vec!["./services/api/".to_string()])
            .build()
            .unwrap();
        assert!(selection.matches(&rule("api", "build", None)));
        assert!(!selection.matches(&rule("web", "build", None)));
    }

    #[test]
    fn every_filter_must_match() {
        let selection = Selection::builder()
            .kinds(vec!["go".to_string()])
            .rules(vec!["test".to_string()])
            .build()
            .unwrap();
        assert!(selection.matches(&rule("api", "test", Some("go"))));
        assert!(!selection.matches(&rule("api", "build", Some("go"))));
        assert!(!selection.matches(&rule("web", "test", Some("node"))));
        assert!(!selection.matches(&rule("web", "test", None)));
    }

    #[test]
    fn rules_can_be_selected_by_identifier() {
        let selection = Selection::builder()
            .rules(vec!["web:test".to_string()])
            .build()
            .unwrap();
        assert!(selection.matches(&rule("web", "test", None)));
        assert!(!selection.matches(&rule("api", "test", None)));
    }
}
