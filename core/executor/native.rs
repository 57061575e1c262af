use super::{process, ExecOpts, Executor, ExecutorError};
use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::*;

/// Runs commands as `bash -e -c <script>` directly on the host.
///
#[derive(Debug, Clone)]
pub struct NativeExecutor {
    shell: String,
}

impl Default for NativeExecutor {
    fn default() -> Self {
        Self::new("bash")
    }
}

impl NativeExecutor {
    pub fn new<S: Into<String>>(shell: S) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

#[async_trait]
impl Executor for NativeExecutor {
    fn uses_docker(&self) -> bool {
        false
    }

    #[tracing::instrument(name = "NativeExecutor::execute", skip(self, opts, cancel), fields(name = opts.name()))]
    async fn execute(
        &self,
        opts: &ExecOpts,
        cancel: &CancellationToken,
    ) -> Result<(), ExecutorError> {
        let script = opts.script();
        let args = ["-e".to_string(), "-c".to_string(), script.clone()];

        if opts.debug() {
            opts.cmdout()
                .write_line(&format!("dbg: {} {}", self.shell, args.join(" ")));
        }
        opts.cmdout().write_line(&format!("cmd: {}", script));

        let mut cmd = Command::new(&self.shell);
        cmd.args(&args)
            .current_dir(opts.working_dir())
            .env_clear()
            .envs(opts.base_env().iter())
            .envs(opts.env().iter());

        trace!("Running {:?} in {:?}", script, opts.working_dir());
        process::run(cmd, &self.shell, opts, cancel).await
    }
}
