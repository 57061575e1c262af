//! # Scheduler
//!
//! Runs a topologically ordered set of rules on a bounded pool of workers. A rule is dispatched
//! once every one of its dependencies has a terminal status, and every rule goes through the same
//! steps: dependency check, conditions, fingerprint, run record, cache, execution, output
//! verification and storage.
//!
//! Rules sharing a fingerprint in the same run are only ever built once; see `InFlight`.
//!
mod context;
mod coordinator;
mod in_flight;
mod queue;
mod report;
mod results;
mod worker;

pub use context::*;
pub use coordinator::*;
pub use in_flight::*;
pub use queue::*;
pub use report::*;
pub use results::*;
pub use worker::*;

use crate::events::event::WorkflowEvent;
use crate::graph::RuleIdx;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::*;

pub struct Scheduler {
    ctx: SharedContext,
    jobs: usize,
}

impl Scheduler {
    pub fn new(ctx: SharedContext, jobs: usize) -> Self {
        Self {
            ctx,
            jobs: jobs.max(1),
        }
    }

    /// Runs `order` to completion, or until `cancel` fires.
    ///
    /// Cancellation stops dispatching, aborts running commands, and marks the rules they belonged
    /// to as cancelled.
    ///
    #[tracing::instrument(name = "Scheduler::run", skip(self, order, cancel))]
    pub async fn run(&self, order: &[RuleIdx], cancel: CancellationToken) -> RunReport {
        let started = Instant::now();
        self.ctx
            .event_channel
            .send(WorkflowEvent::run_started(order.len()));

        let run = Arc::new(RunState {
            queue: RuleQueue::new(self.ctx.graph.clone(), order, Arc::new(Coordinator::new())),
            results: RuleResults::new(),
            in_flight: InFlight::new(),
        });

        let workers = self.jobs.min(order.len()).max(1);
        debug!("Running {} rules on {} workers", order.len(), workers);

        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let worker = RuleWorker::new(id, self.ctx.clone(), run.clone(), cancel.clone());
            handles.push(tokio::spawn(worker.run()));
        }

        for handle in futures::future::join_all(handles).await {
            if let Err(err) = handle {
                error!("Worker crashed: {}", err);
            }
        }

        let mut rules = vec![];
        let mut not_run = vec![];
        for idx in order {
            let id = self.ctx.graph.rule(*idx).id().clone();
            match run.results.get(*idx) {
                Some(result) => rules.push(RuleReport {
                    id,
                    status: result.status,
                    detail: result.detail,
                    fingerprint: result.fingerprint,
                    duration: result.duration,
                }),
                None => not_run.push(id),
            }
        }

        let outcome = if cancel.is_cancelled() {
            self.ctx.event_channel.send(WorkflowEvent::Cancelled);
            RunOutcome::Cancelled
        } else if run.results.has_failures() || !not_run.is_empty() {
            RunOutcome::Failure
        } else {
            RunOutcome::Success
        };

        self.ctx.event_channel.send(WorkflowEvent::run_completed());

        RunReport {
            outcome,
            rules,
            not_run,
            duration: started.elapsed(),
        }
    }
}
