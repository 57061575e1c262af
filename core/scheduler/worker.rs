use super::{Claim, Follower, LeaderOutcome, Next, RuleResult, RunState, SharedContext};
use crate::cache::{Artifact, CacheError};
use crate::condition::ConditionError;
use crate::events::event::RuleEvent;
use crate::executor::{ExecOpts, Executor, ExecutorError, OutputStream};
use crate::graph::RuleIdx;
use crate::model::{Fingerprint, Rule, RunStatus, StatusDetail};
use crate::util::paths;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::*;

/// Pulls ready rules off the queue and drives each one to a terminal status.
///
pub struct RuleWorker {
    id: usize,
    ctx: SharedContext,
    run: Arc<RunState>,
    cancel: CancellationToken,
}

impl RuleWorker {
    pub fn new(
        id: usize,
        ctx: SharedContext,
        run: Arc<RunState>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            ctx,
            run,
            cancel,
        }
    }

    #[tracing::instrument(name = "RuleWorker::run", skip(self), fields(worker = self.id))]
    pub async fn run(self) {
        loop {
            if self.cancel.is_cancelled() {
                debug!("Cancelled, not picking up more rules");
                break;
            }

            let changed = self.run.queue.changed();
            match self.run.queue.next() {
                Next::Rule(idx) => {
                    let result = self.handle(idx).await;
                    let failed = result.status.is_failure();
                    self.run.results.insert(idx, result);
                    if failed && self.ctx.stop_on_failure {
                        self.run.queue.drain();
                    }
                    self.run.queue.complete(idx);
                }
                Next::Wait => {
                    tokio::select! {
                        _ = changed => (),
                        _ = self.cancel.cancelled() => break,
                    }
                }
                Next::Finished => break,
            }
        }
    }

    async fn handle(&self, idx: RuleIdx) -> RuleResult {
        let started = Instant::now();
        let rule = self.ctx.graph.rule(idx).clone();

        self.ctx.event_channel.send(RuleEvent::RuleStarted {
            rule: rule.id().clone(),
        });

        let mut result = self.process(idx, &rule).await;
        result.duration = started.elapsed();

        info!(
            "{} finished with {} ({})",
            rule.id(),
            result.status,
            result.detail
        );
        self.ctx.event_channel.send(RuleEvent::RuleCompleted {
            rule: rule.id().clone(),
            status: result.status,
            detail: result.detail.clone(),
        });

        result
    }

    #[tracing::instrument(name = "RuleWorker::process", skip(self, rule), fields(rule = %rule.id()))]
    async fn process(&self, idx: RuleIdx, rule: &Rule) -> RuleResult {
        let mut dep_fingerprints = vec![];
        for dep in self.ctx.graph.dependencies(idx) {
            let dep_id = self.ctx.graph.rule(*dep).id().clone();
            match self.run.results.get(*dep) {
                Some(result) if result.status.is_failure() => {
                    return RuleResult::error(StatusDetail::DependencyFailed(dep_id));
                }
                Some(result) => {
                    dep_fingerprints.push(result.fingerprint.unwrap_or_else(Fingerprint::absent))
                }
                None => {
                    return RuleResult::error(StatusDetail::Failed(format!(
                        "dependency {} did not complete",
                        dep_id
                    )))
                }
            }
        }

        if self.cancel.is_cancelled() {
            return RuleResult::error(StatusDetail::Cancelled);
        }

        let executor = self.ctx.selector.select(rule);

        match self
            .ctx
            .conditions
            .evaluate(rule, executor.as_ref(), &self.cancel)
            .await
        {
            Ok(true) => (),
            Ok(false) => return RuleResult::new(RunStatus::UpToDate, StatusDetail::ConditionNotMet),
            Err(ConditionError::Cancelled { .. }) => {
                return RuleResult::error(StatusDetail::Cancelled)
            }
            Err(err @ ConditionError::Execution { .. }) if is_launch_failure(&err) => {
                return RuleResult::error(StatusDetail::Failed(err.to_string()))
            }
            Err(err) => {
                return RuleResult::new(RunStatus::ExecError, StatusDetail::Failed(err.to_string()))
            }
        }

        let fingerprint = match self
            .ctx
            .fingerprinter
            .fingerprint(rule, &dep_fingerprints)
            .await
        {
            Ok(fingerprint) => fingerprint,
            Err(err) => return RuleResult::error(StatusDetail::Failed(err.to_string())),
        };
        debug!("Fingerprint is {}", fingerprint);

        let leader = match self.run.in_flight.claim(&fingerprint) {
            Claim::Leader(leader) => Some(leader),
            Claim::Follower(follower) => match self.follow(rule, &fingerprint, follower).await {
                Some(result) => return result,
                None => None,
            },
        };

        let (result, artifact) = self.build(rule, &fingerprint, executor.as_ref()).await;

        if let Some(leader) = leader {
            leader.publish(LeaderOutcome {
                rule: rule.id().clone(),
                status: result.status,
                artifact,
            });
        }

        result.with_fingerprint(&fingerprint)
    }

    /// Reuses the outcome of the rule that claimed the same fingerprint first. Returns `None`
    /// when there is nothing to reuse and the rule should go through the regular path.
    async fn follow(
        &self,
        rule: &Rule,
        fingerprint: &Fingerprint,
        follower: Follower,
    ) -> Option<RuleResult> {
        debug!("Waiting on another rule with the same fingerprint");
        let outcome = tokio::select! {
            outcome = follower.outcome() => outcome,
            _ = self.cancel.cancelled() => return Some(RuleResult::error(StatusDetail::Cancelled)),
        };

        let outcome = match outcome {
            Some(outcome) => outcome,
            None => {
                return Some(RuleResult::error(StatusDetail::Failed(
                    "the rule sharing this fingerprint did not finish".to_string(),
                )))
            }
        };

        let detail = StatusDetail::Deduplicated {
            leader: outcome.rule.clone(),
        };

        if outcome.status.is_failure() {
            return Some(RuleResult::new(outcome.status, detail).with_fingerprint(fingerprint));
        }

        let artifact = outcome.artifact?;
        if let Err(err) = artifact.unpack(rule.dir()).await {
            warn!("Could not reuse the outputs of {}: {}", outcome.rule, err);
            return None;
        }
        self.record(rule, fingerprint).await;
        Some(RuleResult::new(RunStatus::Cached, detail).with_fingerprint(fingerprint))
    }

    async fn build(
        &self,
        rule: &Rule,
        fingerprint: &Fingerprint,
        executor: &dyn Executor,
    ) -> (RuleResult, Option<Artifact>) {
        match self.ctx.records.is_up_to_date(rule, fingerprint).await {
            Ok(true) => {
                return (
                    RuleResult::new(RunStatus::UpToDate, StatusDetail::OutputsUnchanged),
                    None,
                )
            }
            Ok(false) => (),
            Err(err) => warn!("Ignoring run record of {}: {}", rule.id(), err),
        }

        match self.ctx.cache.lookup(rule.id(), fingerprint).await {
            Ok(Some((artifact, tier))) => match artifact.unpack(rule.dir()).await {
                Ok(()) => {
                    self.record(rule, fingerprint).await;
                    return (
                        RuleResult::new(RunStatus::Cached, StatusDetail::Restored(tier)),
                        Some(artifact),
                    );
                }
                // A corrupt entry is a miss, the fresh artifact replaces it.
                Err(err) => {
                    let err = CacheError::from(err);
                    self.ctx.cache.discard(rule.id(), fingerprint, tier, &err).await;
                }
            },
            Ok(None) => (),
            Err(err) => return (RuleResult::error(StatusDetail::Failed(err.to_string())), None),
        }

        if let Err(result) = self.execute(rule, executor).await {
            return (result, None);
        }

        let missing: Vec<String> = rule
            .outputs()
            .iter()
            .filter(|pattern| !paths::matches_any(rule.dir(), pattern).unwrap_or(false))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return (
                RuleResult::new(
                    RunStatus::MissingOutputError,
                    StatusDetail::MissingOutputs(missing),
                ),
                None,
            );
        }

        let artifact = match self.pack(rule).await {
            Ok(artifact) => artifact,
            Err(reason) => return (RuleResult::error(StatusDetail::Failed(reason)), None),
        };

        if let Err(err) = self.ctx.cache.store(rule.id(), fingerprint, &artifact).await {
            return (RuleResult::error(StatusDetail::Failed(err.to_string())), None);
        }

        self.record(rule, fingerprint).await;
        (
            RuleResult::new(RunStatus::Ok, StatusDetail::Executed),
            Some(artifact),
        )
    }

    async fn execute(&self, rule: &Rule, executor: &dyn Executor) -> Result<(), RuleResult> {
        self.ctx.event_channel.send(RuleEvent::RuleExecuting {
            rule: rule.id().clone(),
            image: rule.image().map(str::to_string),
        });

        let opts = command_opts(
            rule,
            self.ctx.base_env.clone(),
            &self.ctx.root,
            executor.uses_docker(),
            self.ctx.debug,
        )
        .map_err(|err| RuleResult::error(StatusDetail::Failed(err.to_string())))?;

        match executor.execute(&opts, &self.cancel).await {
            Ok(()) => Ok(()),
            Err(ExecutorError::Cancelled { .. }) => Err(RuleResult::error(StatusDetail::Cancelled)),
            Err(err) if err.is_launch_failure() => {
                Err(RuleResult::error(StatusDetail::Failed(err.to_string())))
            }
            Err(err) => Err(RuleResult::new(
                RunStatus::ExecError,
                StatusDetail::Failed(err.to_string()),
            )),
        }
    }

    async fn pack(&self, rule: &Rule) -> Result<Artifact, String> {
        let files = paths::expand_files(rule.dir(), rule.outputs()).map_err(|e| e.to_string())?;
        Artifact::pack(rule.dir(), files)
            .await
            .map_err(|e| e.to_string())
    }

    async fn record(&self, rule: &Rule, fingerprint: &Fingerprint) {
        let saved = match self.ctx.records.capture(rule, fingerprint) {
            Ok(record) => self.ctx.records.save(&record).await,
            Err(err) => Err(err),
        };
        if let Err(err) = saved {
            warn!("Could not save run record of {}: {}", rule.id(), err);
        }
    }
}

/// The options a rule's command runs with. Containers get the repository root mounted, so files
/// of other components stay reachable from inside them.
pub(crate) fn command_opts(
    rule: &Rule,
    base_env: Arc<BTreeMap<String, String>>,
    root: &Path,
    uses_docker: bool,
    debug: bool,
) -> Result<ExecOpts, ExecutorError> {
    let volumes = if uses_docker {
        vec![root.to_path_buf()]
    } else {
        vec![]
    };

    ExecOpts::builder()
        .name(rule.id().to_string())
        .command(rule.command())
        .working_dir(rule.dir())
        .base_env(base_env)
        .env(rule.resolved_env())
        .image(rule.image().map(str::to_string))
        .volumes(volumes)
        .debug(debug)
        .cmdout(OutputStream::Stdout)
        .build()
}

fn is_launch_failure(err: &ConditionError) -> bool {
    matches!(err, ConditionError::Execution { err, .. } if err.is_launch_failure())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::DockerExecutor;
    use crate::model::{Component, RuleId};
    use std::path::PathBuf;

    fn rule() -> Rule {
        let component = Arc::new(
            Component::builder()
                .name("api")
                .root("/repo/services/api")
                .image(Some("golang:1.20".to_string()))
                .build()
                .unwrap(),
        );
        Rule::builder()
            .id(RuleId::new("api", "build"))
            .component(component)
            .command("go build ../shared/...")
            .build()
            .unwrap()
    }

    #[test]
    fn containers_get_the_repository_root_mounted() {
        let opts = command_opts(&rule(), Arc::default(), Path::new("/repo"), true, false).unwrap();
        assert_eq!(opts.volumes(), &[PathBuf::from("/repo")]);

        let args = DockerExecutor::default().args(
            &opts,
            &PathBuf::from("/repo/services/api"),
            "golang:1.20",
        );
        let mounts: Vec<&String> = args
            .windows(2)
            .filter(|pair| pair[0] == "-v")
            .map(|pair| &pair[1])
            .collect();
        assert_eq!(
            mounts,
            vec!["/repo/services/api:/repo/services/api", "/repo:/repo"]
        );
    }

    #[test]
    fn native_commands_get_no_volumes() {
        let opts = command_opts(&rule(), Arc::default(), Path::new("/repo"), false, false).unwrap();
        assert!(opts.volumes().is_empty());
    }

    #[test]
    fn the_command_line_is_echoed_outside_of_debug_mode() {
        let opts = command_opts(&rule(), Arc::default(), Path::new("/repo"), false, false).unwrap();
        assert!(!opts.cmdout().is_null());
        assert!(!opts.debug());
    }
}
