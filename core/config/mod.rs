use crate::events::EventChannel;
use crate::model::RuleId;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::*;
use url::Url;

/// The directory, relative to the repository root, where run records live by default.
pub const STATE_DIR: &str = ".strata";

/// A collection of flags and options that affect how a run behaves. It is not specific to a set
/// of selected rules, see `Selection` for that.
///
#[derive(Builder, Debug, Clone)]
#[builder(build_fn(error = "ConfigError"))]
pub struct Config {
    /// The repository root in which components are discovered.
    #[builder(setter(into), default = "self.default_root()")]
    root: PathBuf,

    /// Where per-rule run records are kept.
    #[builder(setter(into), default = "self.default_state_root()")]
    state_root: PathBuf,

    /// The root of the local cache tier. Without one, only the remote tier is used.
    #[builder(setter(into, strip_option), default = "None")]
    cache_root: Option<PathBuf>,

    #[builder(default)]
    cache_mode: CacheMode,

    /// The remote cache tier.
    #[builder(setter(strip_option), default = "None")]
    remote: Option<RemoteConfig>,

    /// Run rules that declare an image inside a container.
    #[builder(default = "false")]
    use_docker: bool,

    #[builder(setter(into), default = "self.default_docker_bin()")]
    docker_bin: String,

    #[builder(setter(into), default = "self.default_shell()")]
    shell: String,

    /// The maximum number of rules executing at the same time.
    #[builder(default = "self.default_jobs()")]
    jobs: usize,

    /// Echo the full command lines handed to executors.
    #[builder(default = "false")]
    debug: bool,

    /// Stop dispatching new rules as soon as one fails.
    #[builder(default = "false")]
    stop_on_failure: bool,

    /// The environment at the time this config was created. Executors start from this snapshot
    /// instead of reading the process environment.
    #[builder(default = "self.default_env()")]
    env: Arc<BTreeMap<String, String>>,

    /// The time at which this configuration was created. Used to compute the total run time.
    #[builder(default = "self.default_created_at()")]
    created_at: Instant,

    #[builder(default = "self.default_event_channel()")]
    event_channel: Arc<EventChannel>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            state_root: PathBuf::from(".").join(STATE_DIR),
            cache_root: None,
            cache_mode: CacheMode::default(),
            remote: None,
            use_docker: false,
            docker_bin: "docker".to_string(),
            shell: "bash".to_string(),
            jobs: num_cpus::get(),
            debug: false,
            stop_on_failure: false,
            env: Arc::new(BTreeMap::new()),
            created_at: Instant::now(),
            event_channel: Arc::new(EventChannel::new()),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    pub fn set_root<P>(&mut self, root: P)
    where
        P: Into<PathBuf>,
    {
        self.root = root.into();
    }

    pub fn state_root(&self) -> &PathBuf {
        &self.state_root
    }

    pub fn cache_root(&self) -> Option<&PathBuf> {
        self.cache_root.as_ref()
    }

    pub fn cache_mode(&self) -> CacheMode {
        self.cache_mode
    }

    pub fn remote(&self) -> Option<&RemoteConfig> {
        self.remote.as_ref()
    }

    pub fn use_docker(&self) -> bool {
        self.use_docker
    }

    pub fn docker_bin(&self) -> &str {
        self.docker_bin.as_ref()
    }

    pub fn shell(&self) -> &str {
        self.shell.as_ref()
    }

    pub fn jobs(&self) -> usize {
        self.jobs.max(1)
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn stop_on_failure(&self) -> bool {
        self.stop_on_failure
    }

    pub fn env(&self) -> Arc<BTreeMap<String, String>> {
        self.env.clone()
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn event_channel(&self) -> Arc<EventChannel> {
        self.event_channel.clone()
    }
}

impl ConfigBuilder {
    fn _root(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(|| self.default_root())
    }

    fn default_root(&self) -> PathBuf {
        PathBuf::from(".")
    }

    fn default_state_root(&self) -> PathBuf {
        self._root().join(STATE_DIR)
    }

    fn default_docker_bin(&self) -> String {
        "docker".to_string()
    }

    fn default_shell(&self) -> String {
        "bash".to_string()
    }

    fn default_jobs(&self) -> usize {
        num_cpus::get()
    }

    fn default_created_at(&self) -> Instant {
        Instant::now()
    }

    fn default_event_channel(&self) -> Arc<EventChannel> {
        EventChannel::new().into()
    }

    fn default_env(&self) -> Arc<BTreeMap<String, String>> {
        let env = std::env::vars_os()
            .filter_map(|(k, v)| match (k.into_string(), v.into_string()) {
                (Ok(k), Ok(v)) => Some((k, v)),
                _ => None,
            })
            .collect();
        Arc::new(env)
    }
}

/// Controls which cache tiers are read and written.
///
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq)]
pub enum CacheMode {
    /// Read from every tier, write to every tier.
    #[default]
    ReadWrite,

    /// Read from every tier, write only to the local tier.
    ReadOnly,

    /// Never read or write any tier.
    Disabled,
}

impl CacheMode {
    pub fn reads(&self) -> bool {
        !matches!(self, CacheMode::Disabled)
    }

    pub fn writes_remote(&self) -> bool {
        matches!(self, CacheMode::ReadWrite)
    }
}

impl FromStr for CacheMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read-write" | "" => Ok(CacheMode::ReadWrite),
            "read-only" => Ok(CacheMode::ReadOnly),
            "disabled" => Ok(CacheMode::Disabled),
            other => Err(ConfigError::InvalidCacheMode(other.to_string())),
        }
    }
}

impl std::fmt::Display for CacheMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheMode::ReadWrite => f.write_str("read-write"),
            CacheMode::ReadOnly => f.write_str("read-only"),
            CacheMode::Disabled => f.write_str("disabled"),
        }
    }
}

/// Where the remote cache tier lives.
///
#[derive(Builder, Debug, Clone, PartialEq, Eq)]
#[builder(build_fn(error = "ConfigError"))]
pub struct RemoteConfig {
    #[builder(setter(into))]
    bucket: String,

    /// A custom endpoint, eg. for S3-compatible stores.
    #[builder(setter(strip_option), default = "None")]
    url: Option<Url>,

    #[builder(setter(into, strip_option), default = "None")]
    region: Option<String>,

    /// A key prefix prepended to every object written.
    #[builder(setter(into, strip_option), default = "None")]
    prefix: Option<String>,
}

impl RemoteConfig {
    pub fn builder() -> RemoteConfigBuilder {
        RemoteConfigBuilder::default()
    }

    pub fn bucket(&self) -> &str {
        self.bucket.as_ref()
    }

    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Attempted to build a Config struct while missing fields: {0:?}")]
    BuilderError(derive_builder::UninitializedFieldError),

    #[error("Unknown cache mode {0:?}, expected one of read-write, read-only, or disabled")]
    InvalidCacheMode(String),

    #[error("Could not walk the repository: {0}")]
    CouldNotWalk(ignore::Error),

    #[error("Could not read manifest at {path:?}: {err:?}")]
    CouldNotReadManifest { path: PathBuf, err: std::io::Error },

    #[error("Could not parse manifest at {path:?}: {err}")]
    MalformedManifest {
        path: PathBuf,
        err: serde_json::Error,
    },

    #[error("Invalid manifest at {path:?}: {reason}")]
    InvalidManifest { path: PathBuf, reason: String },

    #[error("Invalid pattern {pattern:?} in manifest at {path:?}: {err}")]
    InvalidPattern {
        path: PathBuf,
        pattern: String,
        err: glob::PatternError,
    },

    #[error("Component {name:?} is declared both in {first:?} and {second:?}")]
    DuplicateComponent {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Rule {0} is declared more than once")]
    DuplicateRule(RuleId),
}

impl From<derive_builder::UninitializedFieldError> for ConfigError {
    fn from(err: derive_builder::UninitializedFieldError) -> Self {
        Self::BuilderError(err)
    }
}
