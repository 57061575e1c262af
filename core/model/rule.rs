use super::{Component, Condition, RuleId};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// A named, runnable step of a component.
///
/// Inputs and outputs are glob patterns relative to the component root. Dependencies are always
/// fully qualified by the time a `Rule` is built.
///
#[derive(Builder, Clone, Debug)]
#[builder(setter(into))]
pub struct Rule {
    id: RuleId,

    component: Arc<Component>,

    #[builder(default)]
    description: Option<String>,

    #[builder(default)]
    kind: Option<String>,

    command: String,

    #[builder(default)]
    inputs: Vec<String>,

    #[builder(default)]
    outputs: Vec<String>,

    #[builder(default)]
    requires: Vec<RuleId>,

    #[builder(default)]
    image: Option<String>,

    /// Forces native execution even if the component declares an image.
    #[builder(default)]
    native: bool,

    #[builder(default)]
    environment: BTreeMap<String, String>,

    #[builder(default)]
    when: Option<Condition>,

    #[builder(default)]
    unless: Option<Condition>,
}

impl Rule {
    pub fn builder() -> RuleBuilder {
        RuleBuilder::default()
    }

    pub fn id(&self) -> &RuleId {
        &self.id
    }

    pub fn name(&self) -> &str {
        self.id.rule()
    }

    pub fn component(&self) -> &Arc<Component> {
        &self.component
    }

    /// The directory every command and pattern of this rule is relative to.
    pub fn dir(&self) -> &Path {
        self.component.root()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The rule's kind tag, falling back to the component's.
    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref().or_else(|| self.component.kind())
    }

    pub fn command(&self) -> &str {
        self.command.as_ref()
    }

    pub fn inputs(&self) -> &[String] {
        self.inputs.as_ref()
    }

    pub fn outputs(&self) -> &[String] {
        self.outputs.as_ref()
    }

    pub fn requires(&self) -> &[RuleId] {
        self.requires.as_ref()
    }

    /// The image this rule runs in. `None` means the rule runs natively.
    pub fn image(&self) -> Option<&str> {
        if self.native {
            return None;
        }
        self.image
            .as_deref()
            .or_else(|| self.component.image())
            .filter(|image| !image.is_empty())
    }

    pub fn when(&self) -> Option<&Condition> {
        self.when.as_ref()
    }

    pub fn unless(&self) -> Option<&Condition> {
        self.unless.as_ref()
    }

    /// The component environment overlaid with the rule's own overrides.
    pub fn resolved_env(&self) -> BTreeMap<String, String> {
        let mut env = self.component.environment().clone();
        env.extend(
            self.environment
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(image: Option<&str>) -> Arc<Component> {
        Arc::new(
            Component::builder()
                .name("api")
                .root("/repo/api")
                .kind(Some("go".to_string()))
                .image(image.map(String::from))
                .environment(BTreeMap::from([
                    ("A".to_string(), "component".to_string()),
                    ("B".to_string(), "component".to_string()),
                ]))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn rule_environment_overrides_component_environment() {
        let rule = Rule::builder()
            .id(RuleId::new("api", "build"))
            .component(component(None))
            .command("go build")
            .environment(BTreeMap::from([("B".to_string(), "rule".to_string())]))
            .build()
            .unwrap();

        let env = rule.resolved_env();
        assert_eq!(env.get("A").unwrap(), "component");
        assert_eq!(env.get("B").unwrap(), "rule");
    }

    #[test]
    fn image_and_kind_fall_back_to_the_component() {
        let rule = Rule::builder()
            .id(RuleId::new("api", "build"))
            .component(component(Some("golang:1.20")))
            .command("go build")
            .build()
            .unwrap();

        assert_eq!(rule.image(), Some("golang:1.20"));
        assert_eq!(rule.kind(), Some("go"));
        assert_eq!(rule.dir(), Path::new("/repo/api"));
    }

    #[test]
    fn native_rules_never_run_in_an_image() {
        let rule = Rule::builder()
            .id(RuleId::new("api", "lint"))
            .component(component(Some("golang:1.20")))
            .command("go vet")
            .native(true)
            .build()
            .unwrap();

        assert_eq!(rule.image(), None);
    }
}
