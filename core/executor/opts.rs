use super::{ExecutorError, OutputStream};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Everything an executor needs to run one command.
///
/// The environment is split in two: `base_env` is the ambient environment captured when the run
/// was configured, and `env` holds the variables the rule declares. Native execution sees both
/// (declared values win); container execution only sees the declared ones.
///
#[derive(Builder, Clone, Debug)]
#[builder(setter(into), build_fn(error = "ExecutorError"))]
pub struct ExecOpts {
    /// A label for logs and errors, usually the rule identifier.
    name: String,

    command: String,

    #[builder(default = "PathBuf::from(\".\")")]
    working_dir: PathBuf,

    #[builder(default)]
    base_env: Arc<BTreeMap<String, String>>,

    #[builder(default)]
    env: BTreeMap<String, String>,

    #[builder(default)]
    image: Option<String>,

    /// Extra host paths made available to containers.
    #[builder(default)]
    volumes: Vec<PathBuf>,

    #[builder(default)]
    debug: bool,

    /// Receives the echoed command line.
    #[builder(default)]
    cmdout: OutputStream,

    #[builder(default)]
    stdout: OutputStream,

    #[builder(default = "OutputStream::Stderr")]
    stderr: OutputStream,
}

impl ExecOpts {
    pub fn builder() -> ExecOptsBuilder {
        ExecOptsBuilder::default()
    }

    pub fn name(&self) -> &str {
        self.name.as_ref()
    }

    pub fn command(&self) -> &str {
        self.command.as_ref()
    }

    /// The command as a single shell line: surrounding whitespace trimmed, and every non-empty
    /// line joined with `; `.
    pub fn script(&self) -> String {
        self.command
            .trim()
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<&str>>()
            .join("; ")
    }

    pub fn working_dir(&self) -> &PathBuf {
        &self.working_dir
    }

    pub fn base_env(&self) -> &BTreeMap<String, String> {
        &self.base_env
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    pub fn volumes(&self) -> &[PathBuf] {
        self.volumes.as_ref()
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn cmdout(&self) -> &OutputStream {
        &self.cmdout
    }

    pub fn stdout(&self) -> &OutputStream {
        &self.stdout
    }

    pub fn stderr(&self) -> &OutputStream {
        &self.stderr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_line_commands_become_one_script() {
        let opts = ExecOpts::builder()
            .name("api:build")
            .command("\n  mkdir -p out\n\n  touch out/a\n")
            .build()
            .unwrap();
        assert_eq!(opts.script(), "mkdir -p out; touch out/a");
        assert_eq!(opts.working_dir(), &PathBuf::from("."));
    }
}
