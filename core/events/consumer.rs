use super::event::Event;
use crossbeam::deque::{Injector, Steal, Worker};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// The receiving end of an `EventChannel`.
///
/// Events are first moved from the shared queue into a local one with `fetch`, then handed out
/// in the order they were sent. The channel only keeps events while a consumer is attached, and
/// dropping the consumer detaches it.
///
pub struct EventConsumer {
    shared: Arc<Injector<Event>>,
    local: Worker<Event>,
    attached: Arc<AtomicUsize>,
}

impl EventConsumer {
    pub(super) fn attach(shared: Arc<Injector<Event>>, attached: Arc<AtomicUsize>) -> Self {
        attached.fetch_add(1, Ordering::SeqCst);
        Self {
            shared,
            local: Worker::new_fifo(),
            attached,
        }
    }

    /// Moves every pending event from the channel into the local queue.
    pub fn fetch(&self) {
        // A single batch steal only moves part of the queue.
        loop {
            match self.shared.steal_batch(&self.local) {
                Steal::Success(()) | Steal::Retry => continue,
                Steal::Empty => break,
            }
        }
    }

    pub fn pop(&self) -> Option<Event> {
        self.local.pop()
    }

    /// Fetches and returns every pending event, oldest first.
    pub fn drain(&self) -> Vec<Event> {
        self.fetch();
        std::iter::from_fn(|| self.pop()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fetch();
        self.local.is_empty()
    }
}

impl Drop for EventConsumer {
    fn drop(&mut self) {
        self.attached.fetch_sub(1, Ordering::SeqCst);
    }
}
