use super::Coordinator;
use crate::graph::{Graph, RuleIdx};
use fxhash::FxHashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::futures::Notified;
use tokio::sync::Notify;
use tracing::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Rule(RuleIdx),
    /// Nothing is ready yet, but rules are still running.
    Wait,
    Finished,
}

#[derive(Debug, Default)]
struct QueueState {
    /// Rules not dispatched yet, in dispatch order.
    waiting: Vec<RuleIdx>,
    busy: FxHashSet<RuleIdx>,
    done: FxHashSet<RuleIdx>,
}

/// The rules of a run, handed out to workers as soon as all their dependencies are done.
///
/// Among ready rules, the one earliest in dispatch order goes first.
///
#[derive(Debug)]
pub struct RuleQueue {
    graph: Arc<Graph>,
    state: Mutex<QueueState>,
    coordinator: Arc<Coordinator>,
    changed: Notify,
}

impl RuleQueue {
    pub fn new(graph: Arc<Graph>, order: &[RuleIdx], coordinator: Arc<Coordinator>) -> Self {
        Self {
            graph,
            state: Mutex::new(QueueState {
                waiting: order.to_vec(),
                ..QueueState::default()
            }),
            coordinator,
            changed: Notify::new(),
        }
    }

    /// A future resolving the next time the queue changes. Create it before calling `next` to
    /// never miss a wake up.
    pub fn changed(&self) -> Notified<'_> {
        self.changed.notified()
    }

    #[tracing::instrument(name = "RuleQueue::next", skip(self))]
    pub fn next(&self) -> Next {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());

        if !self.coordinator.should_dispatch() || state.waiting.is_empty() {
            return if state.busy.is_empty() {
                Next::Finished
            } else {
                Next::Wait
            };
        }

        let ready = state.waiting.iter().position(|idx| {
            self.graph
                .dependencies(*idx)
                .iter()
                .all(|dep| state.done.contains(dep))
        });

        match ready {
            Some(pos) => {
                let idx = state.waiting.remove(pos);
                state.busy.insert(idx);
                trace!("Dispatching {}", self.graph.rule(idx).id());
                Next::Rule(idx)
            }
            None => Next::Wait,
        }
    }

    /// Marks a dispatched rule as terminal and wakes up every waiting worker.
    pub fn complete(&self, idx: RuleIdx) {
        {
            let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
            state.busy.remove(&idx);
            state.done.insert(idx);
        }
        self.changed.notify_waiters();
    }

    /// Stops dispatching new rules.
    pub fn drain(&self) {
        self.coordinator.signal_drain();
        self.changed.notify_waiters();
    }

    /// Rules that were never dispatched.
    pub fn undispatched(&self) -> Vec<RuleIdx> {
        self.state
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .waiting
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Component, Rule, RuleId};

    fn graph() -> Arc<Graph> {
        let component = Arc::new(
            Component::builder()
                .name("x")
                .root("/repo/x")
                .build()
                .unwrap(),
        );
        let rule = |name: &str, deps: &[&str]| {
            Rule::builder()
                .id(RuleId::new("x", name))
                .component(component.clone())
                .command("true")
                .requires(
                    deps.iter()
                        .map(|d| RuleId::new("x", *d))
                        .collect::<Vec<RuleId>>(),
                )
                .build()
                .unwrap()
        };
        let rules = vec![rule("a", &[]), rule("b", &["a"]), rule("c", &[])];
        Arc::new(Graph::new(vec![(component.clone(), rules)]).unwrap())
    }

    #[test]
    fn rules_wait_for_their_dependencies() {
        let graph = graph();
        let order = graph.select(&crate::graph::Selection::all()).unwrap();
        let queue = RuleQueue::new(graph, &order, Arc::new(Coordinator::new()));

        assert_eq!(queue.next(), Next::Rule(0));
        assert_eq!(queue.next(), Next::Rule(2));
        assert_eq!(queue.next(), Next::Wait);

        queue.complete(0);
        assert_eq!(queue.next(), Next::Rule(1));
        queue.complete(1);
        queue.complete(2);
        assert_eq!(queue.next(), Next::Finished);
    }

    #[test]
    fn draining_finishes_once_busy_rules_complete() {
        let graph = graph();
        let order = graph.select(&crate::graph::Selection::all()).unwrap();
        let queue = RuleQueue::new(graph, &order, Arc::new(Coordinator::new()));

        assert_eq!(queue.next(), Next::Rule(0));
        queue.drain();
        assert_eq!(queue.next(), Next::Wait);
        queue.complete(0);
        assert_eq!(queue.next(), Next::Finished);
        assert_eq!(queue.undispatched(), vec![1, 2]);
    }
}
