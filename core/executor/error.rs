use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Could not launch {program:?} for {name}: {err}")]
    CouldNotSpawn {
        name: String,
        program: String,
        err: std::io::Error,
    },

    #[error("{name} exited with {}", .code.map(|c| format!("status {}", c)).unwrap_or_else(|| "a signal".to_string()))]
    NonZeroExit { name: String, code: Option<i32> },

    #[error("{name} was cancelled")]
    Cancelled { name: String },

    #[error("Could not resolve working directory {dir:?} for {name}: {err}")]
    InvalidWorkingDir {
        name: String,
        dir: PathBuf,
        err: std::io::Error,
    },

    #[error("I/O error while running {name}: {err}")]
    Io { name: String, err: std::io::Error },

    #[error("Incomplete execution options: {0}")]
    InvalidOptions(derive_builder::UninitializedFieldError),
}

impl From<derive_builder::UninitializedFieldError> for ExecutorError {
    fn from(err: derive_builder::UninitializedFieldError) -> Self {
        ExecutorError::InvalidOptions(err)
    }
}

impl ExecutorError {
    /// Whether the command never got to run, as opposed to running and failing.
    pub fn is_launch_failure(&self) -> bool {
        matches!(
            self,
            ExecutorError::CouldNotSpawn { .. }
                | ExecutorError::InvalidWorkingDir { .. }
                | ExecutorError::InvalidOptions(_)
        )
    }
}
