use crate::model::{Fingerprint, Rule};
use crate::util::paths::{self, PathError};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::*;

/// Bumped whenever the way fingerprints are computed changes, so old cache entries stop matching.
pub const FINGERPRINT_VERSION: &str = "strata/fingerprint/v1";

#[derive(Error, Debug)]
pub enum FingerprintError {
    #[error("Could not resolve the inputs of {rule}: {err}")]
    Inputs { rule: String, err: PathError },

    #[error("Could not read input {path:?}: {err}")]
    CouldNotRead { path: PathBuf, err: std::io::Error },

    #[error("Fingerprinting was interrupted: {0}")]
    Interrupted(String),
}

/// Hashes the content of a file with SHA-256, streaming it from disk.
pub fn hash_file(path: &Path) -> Result<String, std::io::Error> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Computes rule fingerprints.
///
/// A fingerprint covers the command, the resolved rule environment, the image, the declared
/// outputs, the content of every matched input file (sorted by relative path) and the
/// fingerprints of the rule's dependencies in declaration order. Nothing else is read: the
/// ambient process environment never leaks into it.
///
#[derive(Debug, Default, Clone)]
pub struct Fingerprinter;

impl Fingerprinter {
    pub fn new() -> Self {
        Self
    }

    #[tracing::instrument(name = "Fingerprinter::fingerprint", skip(self, rule, deps), fields(rule = %rule.id()))]
    pub async fn fingerprint(
        &self,
        rule: &Rule,
        deps: &[Fingerprint],
    ) -> Result<Fingerprint, FingerprintError> {
        let rule = rule.clone();
        let deps = deps.to_vec();
        tokio::task::spawn_blocking(move || Self::compute(&rule, &deps))
            .await
            .map_err(|err| FingerprintError::Interrupted(err.to_string()))?
    }

    pub fn compute(rule: &Rule, deps: &[Fingerprint]) -> Result<Fingerprint, FingerprintError> {
        let mut hasher = Sha256::new();
        field(&mut hasher, "version", FINGERPRINT_VERSION);
        field(&mut hasher, "command", rule.command());

        for (name, value) in rule.resolved_env() {
            field(&mut hasher, "env.name", &name);
            field(&mut hasher, "env.value", &value);
        }

        field(&mut hasher, "image", rule.image().unwrap_or_default());

        for output in rule.outputs() {
            field(&mut hasher, "output", output);
        }

        let inputs = paths::expand_files(rule.dir(), rule.inputs()).map_err(|err| {
            FingerprintError::Inputs {
                rule: rule.id().to_string(),
                err,
            }
        })?;

        for input in &inputs {
            let path = rule.dir().join(input);
            let digest =
                hash_file(&path).map_err(|err| FingerprintError::CouldNotRead { path, err })?;
            field(&mut hasher, "input.path", &input.to_string_lossy());
            field(&mut hasher, "input.hash", &digest);
        }

        for dep in deps {
            field(&mut hasher, "dependency", dep.as_str());
        }

        let fingerprint = Fingerprint::from_hex(format!("{:x}", hasher.finalize()));
        trace!(
            "{} has fingerprint {} over {} inputs",
            rule.id(),
            fingerprint,
            inputs.len()
        );
        Ok(fingerprint)
    }
}

/// Length-prefixed so that no two different field sequences hash the same bytes.
fn field(hasher: &mut Sha256, name: &str, value: &str) {
    hasher.update(name.as_bytes());
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Component, RuleId};
    use assert_fs::prelude::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn rule(dir: &Path, inputs: &[&str], env: &[(&str, &str)]) -> Rule {
        let component = Arc::new(
            Component::builder()
                .name("api")
                .root(dir)
                .build()
                .unwrap(),
        );
        Rule::builder()
            .id(RuleId::new("api", "build"))
            .component(component)
            .command("make")
            .inputs(inputs.iter().map(|i| i.to_string()).collect::<Vec<String>>())
            .outputs(vec!["out".to_string()])
            .environment(
                env.iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect::<BTreeMap<String, String>>(),
            )
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn identical_inputs_give_identical_fingerprints() {
        let dir = assert_fs::TempDir::new().unwrap();
        dir.child("a.c").write_str("int a;").unwrap();
        let fp = Fingerprinter::new();

        let first = fp.fingerprint(&rule(dir.path(), &["*.c"], &[]), &[]).await.unwrap();
        let second = fp.fingerprint(&rule(dir.path(), &["*.c"], &[]), &[]).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn content_changes_change_the_fingerprint() {
        let dir = assert_fs::TempDir::new().unwrap();
        dir.child("a.c").write_str("int a;").unwrap();
        let fp = Fingerprinter::new();
        let before = fp.fingerprint(&rule(dir.path(), &["*.c"], &[]), &[]).await.unwrap();

        dir.child("a.c").write_str("int b;").unwrap();
        let after = fp.fingerprint(&rule(dir.path(), &["*.c"], &[]), &[]).await.unwrap();
        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn declared_environment_and_dependencies_matter() {
        let dir = assert_fs::TempDir::new().unwrap();
        let fp = Fingerprinter::new();
        let plain = fp.fingerprint(&rule(dir.path(), &[], &[]), &[]).await.unwrap();
        let with_env = fp
            .fingerprint(&rule(dir.path(), &[], &[("MODE", "release")]), &[])
            .await
            .unwrap();
        let with_dep = fp
            .fingerprint(&rule(dir.path(), &[], &[]), &[Fingerprint::from_hex("ab")])
            .await
            .unwrap();
        assert_ne!(plain, with_env);
        assert_ne!(plain, with_dep);
    }

    #[tokio::test]
    async fn invalid_input_patterns_are_errors() {
        let dir = assert_fs::TempDir::new().unwrap();
        let result = Fingerprinter::new()
            .fingerprint(&rule(dir.path(), &["[z-a"], &[]), &[])
            .await;
        assert_matches!(result, Err(FingerprintError::Inputs { .. }));
    }

    #[quickcheck]
    fn declaration_order_of_inputs_does_not_matter(files: Vec<(u8, String)>) -> bool {
        let dir = assert_fs::TempDir::new().unwrap();
        let mut patterns = vec![];
        for (name, contents) in &files {
            let file = format!("f{}.txt", name);
            dir.child(&file).write_str(contents).unwrap();
            patterns.push(file);
        }
        let mut reversed = patterns.clone();
        reversed.reverse();

        let forward: Vec<&str> = patterns.iter().map(String::as_str).collect();
        let backward: Vec<&str> = reversed.iter().map(String::as_str).collect();

        let a = Fingerprinter::compute(&rule(dir.path(), &forward, &[]), &[]).unwrap();
        let b = Fingerprinter::compute(&rule(dir.path(), &backward, &[]), &[]).unwrap();
        a == b
    }
}
