use super::manifest::{ComponentManifest, COMPONENT_MANIFEST};
use crate::config::ConfigError;
use crate::model::{Component, Rule};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::*;

/// Finds every component manifest under `root`.
///
/// Hidden directories and anything ignored by `.gitignore` files are skipped. Paths are returned
/// in a stable order (sorted by file name at every level) so that declaration order does not
/// depend on the file system.
///
pub fn find_manifests(root: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let mut manifests = vec![];
    let walker = ignore::WalkBuilder::new(root)
        .require_git(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    for entry in walker {
        let entry = entry.map_err(ConfigError::CouldNotWalk)?;
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if is_file && entry.file_name() == COMPONENT_MANIFEST {
            manifests.push(entry.into_path());
        }
    }

    debug!("Found {} component manifests", manifests.len());
    Ok(manifests)
}

/// Reads and validates every component under `root`, in declaration order.
///
#[tracing::instrument(name = "loader::load_components")]
pub async fn load_components(root: &Path) -> Result<Vec<(Arc<Component>, Vec<Rule>)>, ConfigError> {
    let manifests = find_manifests(root)?;

    let mut seen: BTreeMap<String, PathBuf> = BTreeMap::new();
    let mut components = Vec::with_capacity(manifests.len());
    for path in manifests {
        let (component, rules) = ComponentManifest::read(&path).await?.into_component(&path)?;

        if let Some(first) = seen.insert(component.name().to_string(), path.clone()) {
            return Err(ConfigError::DuplicateComponent {
                name: component.name().to_string(),
                first,
                second: path,
            });
        }

        trace!(
            "Loaded component {} with {} rules from {:?}",
            component.name(),
            rules.len(),
            path
        );
        components.push((component, rules));
    }

    Ok(components)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[tokio::test]
    async fn discovers_components_in_a_stable_order() {
        let root = assert_fs::TempDir::new().unwrap();
        root.child("web/component.json")
            .write_str(r#"{ "rules": [ { "name": "build", "command": "true" } ] }"#)
            .unwrap();
        root.child("api/component.json")
            .write_str(r#"{ "rules": [ { "name": "build", "command": "true" } ] }"#)
            .unwrap();
        root.child(".hidden/component.json")
            .write_str(r#"{ "name": "hidden" }"#)
            .unwrap();

        let components = load_components(root.path()).await.unwrap();
        let names: Vec<&str> = components.iter().map(|(c, _)| c.name()).collect();
        assert_eq!(names, vec!["api", "web"]);
    }

    #[tokio::test]
    async fn rejects_components_with_the_same_name() {
        let root = assert_fs::TempDir::new().unwrap();
        root.child("a/component.json")
            .write_str(r#"{ "name": "same" }"#)
            .unwrap();
        root.child("b/component.json")
            .write_str(r#"{ "name": "same" }"#)
            .unwrap();

        assert_matches!(
            load_components(root.path()).await,
            Err(ConfigError::DuplicateComponent { name, .. }) if name == "same"
        );
    }
}
