//! # Executors
//!
//! Executors run one command and report how it went. They never decide a rule's status; that is
//! up to the scheduler.
//!
mod docker;
mod error;
mod native;
mod opts;
mod output;
mod process;
mod selector;

pub use docker::*;
pub use error::*;
pub use native::*;
pub use opts::*;
pub use output::*;
pub use selector::*;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait Executor: Send + Sync + std::fmt::Debug {
    /// Whether commands run inside a container.
    fn uses_docker(&self) -> bool;

    /// Runs `opts` to completion. Fails with `ExecutorError::NonZeroExit` if the command ran but
    /// did not succeed, and with `ExecutorError::Cancelled` if `cancel` fired before it finished.
    async fn execute(
        &self,
        opts: &ExecOpts,
        cancel: &CancellationToken,
    ) -> Result<(), ExecutorError>;
}
