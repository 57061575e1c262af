use crate::config::ConfigError;
use crate::model::{Component, Condition, Rule, RuleId};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

/// The file name every component directory declares itself with.
pub const COMPONENT_MANIFEST: &str = "component.json";

/// The on-disk shape of a `component.json` file. Comments are allowed.
///
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentManifest {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub kind: Option<String>,

    #[serde(default)]
    pub image: Option<String>,

    #[serde(default)]
    pub environment: BTreeMap<String, String>,

    #[serde(default)]
    pub rules: Vec<RuleManifest>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleManifest {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub kind: Option<String>,

    pub command: String,

    #[serde(default)]
    pub inputs: Vec<String>,

    #[serde(default)]
    pub outputs: Vec<String>,

    #[serde(default)]
    pub requires: Vec<String>,

    #[serde(default)]
    pub image: Option<String>,

    #[serde(default)]
    pub native: bool,

    #[serde(default)]
    pub environment: BTreeMap<String, String>,

    #[serde(default)]
    pub when: Option<Condition>,

    #[serde(default)]
    pub unless: Option<Condition>,
}

impl ComponentManifest {
    #[tracing::instrument(name = "ComponentManifest::read")]
    pub async fn read(path: &Path) -> Result<Self, ConfigError> {
        let bytes = fs::read(path)
            .await
            .map_err(|err| ConfigError::CouldNotReadManifest {
                path: path.to_path_buf(),
                err,
            })?;

        // Parsed from memory, the file is not held open.
        let reader = json_comments::StripComments::new(bytes.as_slice());

        serde_json::from_reader(reader).map_err(|err| ConfigError::MalformedManifest {
            path: path.to_path_buf(),
            err,
        })
    }

    /// Validates the manifest found at `path` and turns it into a component and its rules,
    /// in declaration order.
    pub fn into_component(self, path: &Path) -> Result<(Arc<Component>, Vec<Rule>), ConfigError> {
        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let invalid = |reason: String| ConfigError::InvalidManifest {
            path: path.to_path_buf(),
            reason,
        };

        let name = match self.name {
            Some(name) => name,
            None => root
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .ok_or_else(|| invalid("the component has no name".to_string()))?,
        };
        check_name(&name).map_err(|reason| invalid(format!("component name: {}", reason)))?;

        let component = Arc::new(
            Component::builder()
                .name(name.clone())
                .root(root)
                .kind(self.kind)
                .image(self.image)
                .environment(self.environment)
                .build()
                .map_err(|err| invalid(err.to_string()))?,
        );

        let mut seen = BTreeSet::new();
        let mut rules = Vec::with_capacity(self.rules.len());
        for rule in self.rules {
            check_name(&rule.name)
                .map_err(|reason| invalid(format!("rule name {:?}: {}", rule.name, reason)))?;

            let id = RuleId::new(&name, &rule.name);
            if !seen.insert(rule.name.clone()) {
                return Err(ConfigError::DuplicateRule(id));
            }

            if rule.command.trim().is_empty() {
                return Err(invalid(format!("rule {} has an empty command", id)));
            }

            for pattern in rule.inputs.iter().chain(rule.outputs.iter()) {
                check_pattern(path, pattern)?;
            }

            for condition in rule.when.iter().chain(rule.unless.iter()) {
                if condition.value().trim().is_empty() {
                    return Err(invalid(format!("rule {} has an empty condition", id)));
                }
                if let Condition::ResourceExists(pattern) = condition {
                    check_pattern(path, pattern)?;
                }
            }

            let requires = rule
                .requires
                .iter()
                .map(|reference| RuleId::parse_reference(reference, &name))
                .collect::<Result<Vec<RuleId>, _>>()
                .map_err(|err| invalid(format!("rule {}: {}", id, err)))?;

            let built = Rule::builder()
                .id(id)
                .component(component.clone())
                .description(rule.description)
                .kind(rule.kind)
                .command(rule.command)
                .inputs(rule.inputs)
                .outputs(rule.outputs)
                .requires(requires)
                .image(rule.image)
                .native(rule.native)
                .environment(rule.environment)
                .when(rule.when)
                .unless(rule.unless)
                .build()
                .map_err(|err| invalid(err.to_string()))?;

            rules.push(built);
        }

        Ok((component, rules))
    }
}

fn check_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("names can't be empty".to_string());
    }
    if name.contains(':') {
        return Err("names can't contain `:`".to_string());
    }
    Ok(())
}

fn check_pattern(path: &Path, pattern: &str) -> Result<(), ConfigError> {
    if pattern.trim().is_empty() || Path::new(pattern).is_absolute() {
        return Err(ConfigError::InvalidManifest {
            path: path.to_path_buf(),
            reason: format!("{:?} must be a non-empty relative pattern", pattern),
        });
    }
    glob::Pattern::new(pattern)
        .map(|_| ())
        .map_err(|err| ConfigError::InvalidPattern {
            path: path.to_path_buf(),
            pattern: pattern.to_string(),
            err,
        })
}
