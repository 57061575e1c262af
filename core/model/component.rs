use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A directory-rooted unit of the repository exposing a set of rules.
///
/// Components are immutable once loaded, and are shared by all of their rules.
///
#[derive(Builder, Clone, Debug, PartialEq, Eq)]
#[builder(setter(into))]
pub struct Component {
    name: String,

    /// The directory holding the component manifest. Rule patterns and commands are relative to
    /// it.
    root: PathBuf,

    #[builder(default)]
    kind: Option<String>,

    /// Default image for every rule in this component.
    #[builder(default)]
    image: Option<String>,

    #[builder(default)]
    environment: BTreeMap<String, String>,
}

impl Component {
    pub fn builder() -> ComponentBuilder {
        ComponentBuilder::default()
    }

    pub fn name(&self) -> &str {
        self.name.as_ref()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }
}
