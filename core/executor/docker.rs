use super::{process, ExecOpts, Executor, ExecutorError};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Runs commands inside a throwaway container of the rule's image.
///
/// The working directory is mounted at the same path inside the container, so outputs land where
/// a native run would put them. Only the variables a rule declares are passed into the container.
///
#[derive(Debug, Clone)]
pub struct DockerExecutor {
    docker_bin: String,
}

impl Default for DockerExecutor {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerExecutor {
    pub fn new<S: Into<String>>(docker_bin: S) -> Self {
        Self {
            docker_bin: docker_bin.into(),
        }
    }

    pub(crate) fn args(&self, opts: &ExecOpts, working_dir: &PathBuf, image: &str) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "-w".to_string(),
            working_dir.to_string_lossy().to_string(),
            "-v".to_string(),
            format!("{0}:{0}", working_dir.to_string_lossy()),
        ];

        for volume in opts.volumes() {
            args.push("-v".to_string());
            args.push(format!("{0}:{0}", volume.to_string_lossy()));
        }

        for (name, value) in opts.env() {
            args.push("-e".to_string());
            args.push(format!("{}={}", name, value));
        }

        args.extend([
            "--entrypoint".to_string(),
            "bash".to_string(),
            image.to_string(),
            "-e".to_string(),
            "-c".to_string(),
            opts.script(),
        ]);

        args
    }
}

#[async_trait]
impl Executor for DockerExecutor {
    fn uses_docker(&self) -> bool {
        true
    }

    #[tracing::instrument(name = "DockerExecutor::execute", skip(self, opts, cancel), fields(name = opts.name()))]
    async fn execute(
        &self,
        opts: &ExecOpts,
        cancel: &CancellationToken,
    ) -> Result<(), ExecutorError> {
        let image = match opts.image() {
            Some(image) => image,
            None => {
                return Err(ExecutorError::CouldNotSpawn {
                    name: opts.name().to_string(),
                    program: self.docker_bin.clone(),
                    err: std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "no image to run the command in",
                    ),
                })
            }
        };

        let working_dir = tokio::fs::canonicalize(opts.working_dir())
            .await
            .map_err(|err| ExecutorError::InvalidWorkingDir {
                name: opts.name().to_string(),
                dir: opts.working_dir().clone(),
                err,
            })?;

        let args = self.args(opts, &working_dir, image);

        if opts.debug() {
            opts.cmdout()
                .write_line(&format!("dbg: {} {}", self.docker_bin, args.join(" ")));
        }
        opts.cmdout().write_line(&format!("cmd: {}", opts.script()));

        let mut cmd = Command::new(&self.docker_bin);
        cmd.args(&args)
            .current_dir(&working_dir)
            .env_clear()
            .envs(opts.base_env().iter());

        process::run(cmd, &self.docker_bin, opts, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn mounts_the_working_directory_and_passes_declared_variables() {
        let opts = ExecOpts::builder()
            .name("api:build")
            .command("go build\ngo vet")
            .image(Some("golang:1.20".to_string()))
            .volumes(vec![PathBuf::from("/cache")])
            .env(BTreeMap::from([("CGO_ENABLED".to_string(), "0".to_string())]))
            .build()
            .unwrap();

        let args = DockerExecutor::default().args(&opts, &PathBuf::from("/repo/api"), "golang:1.20");
        assert_eq!(
            args,
            vec![
                "run",
                "--rm",
                "-w",
                "/repo/api",
                "-v",
                "/repo/api:/repo/api",
                "-v",
                "/cache:/cache",
                "-e",
                "CGO_ENABLED=0",
                "--entrypoint",
                "bash",
                "golang:1.20",
                "-e",
                "-c",
                "go build; go vet",
            ]
        );
    }

    #[tokio::test]
    async fn refuses_to_run_without_an_image() {
        let opts = ExecOpts::builder()
            .name("api:build")
            .command("true")
            .build()
            .unwrap();
        let result = DockerExecutor::default()
            .execute(&opts, &CancellationToken::new())
            .await;
        assert_matches!(result, Err(err) if err.is_launch_failure());
    }
}
