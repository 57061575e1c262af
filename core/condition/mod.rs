//! # Condition Evaluation
//!
//! Decides whether a rule should run at all, based on its `when` and `unless` guards.
//!
use crate::executor::{ExecOpts, Executor, ExecutorError, OutputStream};
use crate::model::{Condition, Rule};
use crate::util::paths::{self, PathError};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::*;
use tokio_util::sync::CancellationToken;
use tracing::*;

#[derive(Error, Debug)]
pub enum ConditionError {
    #[error("Could not check resource condition of {rule}: {err}")]
    Config { rule: String, err: PathError },

    #[error("Could not run script condition of {rule}: {err}")]
    Execution { rule: String, err: ExecutorError },

    #[error("Condition of {rule} was cancelled")]
    Cancelled { rule: String },
}

#[derive(Debug, Clone)]
pub struct ConditionEvaluator {
    base_env: Arc<BTreeMap<String, String>>,
    root: Option<PathBuf>,
    debug: bool,
}

impl ConditionEvaluator {
    pub fn new(base_env: Arc<BTreeMap<String, String>>, debug: bool) -> Self {
        Self {
            base_env,
            root: None,
            debug,
        }
    }

    /// Mounts `root` into containers running script conditions.
    pub fn with_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Returns `true` if `rule` should run.
    ///
    /// An unmet `when` skips the rule without looking at `unless`. A met `unless` skips it.
    ///
    #[tracing::instrument(name = "ConditionEvaluator::evaluate", skip(self, rule, executor, cancel), fields(rule = %rule.id()))]
    pub async fn evaluate(
        &self,
        rule: &Rule,
        executor: &dyn Executor,
        cancel: &CancellationToken,
    ) -> Result<bool, ConditionError> {
        if let Some(when) = rule.when() {
            if !self.check(when, rule, executor, cancel).await? {
                debug!("`when` condition is not met");
                return Ok(false);
            }
        }

        if let Some(unless) = rule.unless() {
            if self.check(unless, rule, executor, cancel).await? {
                debug!("`unless` condition is met");
                return Ok(false);
            }
        }

        Ok(true)
    }

    pub async fn check(
        &self,
        condition: &Condition,
        rule: &Rule,
        executor: &dyn Executor,
        cancel: &CancellationToken,
    ) -> Result<bool, ConditionError> {
        match condition {
            Condition::ResourceExists(pattern) => {
                paths::matches_any(rule.dir(), pattern).map_err(|err| ConditionError::Config {
                    rule: rule.id().to_string(),
                    err,
                })
            }
            Condition::ScriptSucceeds(script) => {
                let opts = ExecOpts::builder()
                    .name(format!("{}.condition", rule.id()))
                    .command(script.clone())
                    .working_dir(rule.dir())
                    .base_env(self.base_env.clone())
                    .env(rule.resolved_env())
                    .image(rule.image().map(String::from))
                    .volumes(match &self.root {
                        Some(root) if executor.uses_docker() => vec![root.clone()],
                        _ => vec![],
                    })
                    .debug(self.debug)
                    .cmdout(OutputStream::Stdout)
                    .stdout(OutputStream::Null)
                    .stderr(OutputStream::Null)
                    .build()
                    .map_err(|err| ConditionError::Execution {
                        rule: rule.id().to_string(),
                        err,
                    })?;

                match executor.execute(&opts, cancel).await {
                    Ok(()) => Ok(true),
                    Err(ExecutorError::NonZeroExit { .. }) => Ok(false),
                    Err(ExecutorError::Cancelled { .. }) => Err(ConditionError::Cancelled {
                        rule: rule.id().to_string(),
                    }),
                    Err(err) => Err(ConditionError::Execution {
                        rule: rule.id().to_string(),
                        err,
                    }),
                }
            }
        }
    }
}
