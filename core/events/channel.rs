use super::event::Event;
use super::EventConsumer;
use crossbeam::deque::Injector;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Carries run events from the engine to whoever reports on them.
///
/// The queue is unbounded. Events sent while no `EventConsumer` is attached are dropped, and an
/// attached consumer has to keep draining, or every event of the run stays in memory.
///
#[derive(Clone, Debug, Default)]
pub struct EventChannel {
    queue: Arc<Injector<Event>>,
    consumers: Arc<AtomicUsize>,
}

impl EventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn has_consumers(&self) -> bool {
        self.consumers.load(Ordering::SeqCst) > 0
    }

    pub fn send<E>(&self, event: E)
    where
        E: Into<Event>,
    {
        if self.has_consumers() {
            self.queue.push(event.into())
        }
    }

    /// Attaches a new consumer. Consumers compete for the same events, so a run is meant to be
    /// drained by a single front-end.
    pub fn consumer(&self) -> EventConsumer {
        EventConsumer::attach(self.queue.clone(), self.consumers.clone())
    }
}
