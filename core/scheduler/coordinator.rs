use std::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Running,
    /// No new rules are dispatched, rules already running finish normally.
    Draining,
}

/// Tracks whether workers may keep picking up new rules.
///
#[derive(Debug)]
pub struct Coordinator {
    status: RwLock<Status>,
}

impl Coordinator {
    pub fn new() -> Self {
        Self {
            status: RwLock::new(Status::Running),
        }
    }

    pub fn should_dispatch(&self) -> bool {
        self.status() == Status::Running
    }

    pub fn signal_drain(&self) {
        *self
            .status
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Status::Draining
    }

    pub fn status(&self) -> Status {
        *self
            .status
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}
