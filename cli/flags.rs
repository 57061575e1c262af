use std::path::{Path, PathBuf};
use strata_core::{CacheMode, Config, ConfigError, RemoteConfig, Selection};
use structopt::StructOpt;
use url::Url;

#[derive(Default, Debug, Clone, StructOpt)]
pub struct Flags {
    #[structopt(
        help = r"The directory to build. The enclosing git repository is used if there is one.",
        long = "dir",
        parse(from_os_str)
    )]
    pub(crate) dir: Option<PathBuf>,

    #[structopt(
        help = r"Only build rules of these components (comma separated).",
        long = "components",
        use_delimiter = true
    )]
    pub(crate) components: Vec<String>,

    #[structopt(
        help = r"Only build rules of these kinds (comma separated).",
        long = "kinds",
        use_delimiter = true
    )]
    pub(crate) kinds: Vec<String>,

    #[structopt(
        help = r"Only build these rules, by name or as component:rule (comma separated).",
        long = "rules",
        use_delimiter = true
    )]
    pub(crate) rules: Vec<String>,

    #[structopt(
        help = r"The maximum amount of rules to run at the same time.",
        short = "j",
        long = "jobs"
    )]
    pub(crate) jobs: Option<usize>,

    #[structopt(
        help = r"The local cache directory. Defaults to the user cache directory.",
        long = "cache",
        parse(from_os_str)
    )]
    pub(crate) cache: Option<PathBuf>,

    #[structopt(
        help = r"One of read-write, read-only, or disabled.",
        long = "cache-mode",
        default_value = "read-write"
    )]
    pub(crate) cache_mode: CacheMode,

    #[structopt(help = r"The bucket of the remote cache.", long = "bucket")]
    pub(crate) bucket: Option<String>,

    #[structopt(
        help = r"A custom endpoint for S3-compatible remote caches.",
        long = "url"
    )]
    pub(crate) url: Option<Url>,

    #[structopt(help = r"The region of the remote cache bucket.", long = "region")]
    pub(crate) region: Option<String>,

    #[structopt(help = r"A prefix for every remote cache key.", long = "prefix")]
    pub(crate) prefix: Option<String>,

    #[structopt(
        help = r"Run rules that declare an image inside a container.",
        long = "docker"
    )]
    pub(crate) docker: bool,

    #[structopt(help = r"Print the commands being run.", long = "debug")]
    pub(crate) debug: bool,

    #[structopt(
        help = r"Stop starting new rules after the first failure.",
        long = "stop-on-failure"
    )]
    pub(crate) stop_on_failure: bool,

    #[structopt(
        help = r"Download a source snapshot with this key from the remote store and build it.",
        long = "source"
    )]
    pub(crate) source: Option<String>,
}

impl Flags {
    pub fn remote(&self) -> Result<Option<RemoteConfig>, ConfigError> {
        let bucket = match &self.bucket {
            Some(bucket) => bucket,
            None => return Ok(None),
        };

        let mut remote = RemoteConfig::builder();
        remote.bucket(bucket.as_str());
        if let Some(url) = &self.url {
            remote.url(url.clone());
        }
        if let Some(region) = &self.region {
            remote.region(region.as_str());
        }
        if let Some(prefix) = &self.prefix {
            remote.prefix(prefix.as_str());
        }
        remote.build().map(Some)
    }

    pub fn repository_root(&self) -> Result<PathBuf, std::io::Error> {
        let dir = match &self.dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        Ok(find_repository_root(&dir).unwrap_or(dir))
    }

    pub fn selection(&self) -> Result<Selection, anyhow::Error> {
        Ok(Selection::builder()
            .components(self.components.clone())
            .kinds(self.kinds.clone())
            .rules(self.rules.clone())
            .build()?)
    }

    pub fn config(&self, root: PathBuf, remote: Option<RemoteConfig>) -> Result<Config, ConfigError> {
        let mut config = Config::builder();

        config
            .root(root)
            .cache_mode(self.cache_mode)
            .use_docker(self.docker)
            .jobs(self.jobs.unwrap_or_else(num_cpus::get))
            .debug(self.debug)
            .stop_on_failure(self.stop_on_failure);

        if let Some(cache) = self.cache.clone().or_else(default_cache_root) {
            config.cache_root(cache);
        }

        if let Some(remote) = remote {
            config.remote(remote);
        }

        config.build()
    }
}

fn default_cache_root() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.cache_dir().join("strata"))
}

/// Walks up from `dir` to the first directory holding a `.git` entry.
fn find_repository_root(dir: &Path) -> Option<PathBuf> {
    dir.ancestors()
        .find(|ancestor| ancestor.join(".git").exists())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn finds_the_enclosing_repository() {
        let repo = assert_fs::TempDir::new().unwrap();
        repo.child(".git").create_dir_all().unwrap();
        let nested = repo.child("services/api");
        nested.create_dir_all().unwrap();

        assert_eq!(
            find_repository_root(nested.path()),
            Some(repo.path().to_path_buf())
        );
    }

    #[test]
    fn outside_a_repository_the_dir_is_used() {
        let dir = assert_fs::TempDir::new().unwrap();
        let flags = Flags {
            dir: Some(dir.path().to_path_buf()),
            ..Flags::default()
        };
        assert_eq!(flags.repository_root().unwrap(), dir.path().to_path_buf());
    }

    #[test]
    fn parses_filters_and_cache_options() {
        let flags = Flags::from_iter(&[
            "build",
            "--components",
            "api,web",
            "--rules",
            "api:test",
            "--cache-mode",
            "read-only",
            "--bucket",
            "artifacts",
            "--prefix",
            "ci",
            "-j",
            "3",
        ]);

        assert_eq!(flags.components, vec!["api", "web"]);
        assert_eq!(flags.cache_mode, CacheMode::ReadOnly);

        let remote = flags.remote().unwrap().unwrap();
        assert_eq!(remote.bucket(), "artifacts");
        assert_eq!(remote.prefix(), Some("ci"));

        let config = flags.config(PathBuf::from("/repo"), Some(remote)).unwrap();
        assert_eq!(config.jobs(), 3);
        assert_eq!(config.cache_mode(), CacheMode::ReadOnly);
        assert_eq!(config.state_root(), &PathBuf::from("/repo/.strata"));
        assert!(config.remote().is_some());
    }

    #[test]
    fn no_bucket_means_no_remote() {
        assert!(Flags::default().remote().unwrap().is_none());
    }
}
