use crate::cache::{CacheManager, Fingerprinter, LocalCache, RemoteCache};
use crate::condition::ConditionEvaluator;
use crate::config::Config;
use crate::executor::{DefaultExecutorSelector, ExecutorSelector};
use crate::graph::{Graph, GraphError, Selection};
use crate::scheduler::{RunReport, Scheduler, SharedContext};
use crate::state::RunRecords;
use crate::store::{ObjectStore, S3ObjectStore};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::*;
use tokio_util::sync::CancellationToken;
use tracing::*;

/// # Strata Engine
///
/// Orchestrates the top-level flow: it loads the component graph under the configured root,
/// wires up the cache tiers, run records and executors, and hands selected rules to the
/// `Scheduler`.
///
/// Every call to `run` produces a `RunReport`. Rule failures are reported there, only problems
/// loading or selecting from the graph are returned as errors.
///
pub struct Engine {
    config: Config,
    graph: Arc<Graph>,
    scheduler: Scheduler,
}

impl Engine {
    /// Builds an engine with the default executors and, if configured, an S3 remote cache.
    #[instrument(name = "Engine::new", skip(config))]
    pub async fn new(config: Config) -> Result<Self, EngineError> {
        let object_store: Option<Arc<dyn ObjectStore>> = match config.remote() {
            Some(remote) => {
                let store: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::new(remote).await);
                Some(store)
            }
            None => None,
        };
        let selector = Arc::new(DefaultExecutorSelector::new(&config));
        Self::with_parts(config, object_store, selector).await
    }

    #[instrument(name = "Engine::with_parts", skip(config, object_store, selector))]
    pub async fn with_parts(
        mut config: Config,
        object_store: Option<Arc<dyn ObjectStore>>,
        selector: Arc<dyn ExecutorSelector>,
    ) -> Result<Self, EngineError> {
        let root = tokio::fs::canonicalize(config.root())
            .await
            .map_err(|err| EngineError::InvalidRoot {
                root: config.root().clone(),
                err,
            })?;
        config.set_root(root);

        let graph = Arc::new(Graph::load(config.root()).await?);
        info!(
            "Loaded {} rules from {} components",
            graph.len(),
            graph.components().len()
        );

        let local = config.cache_root().map(LocalCache::new);
        let prefix = config
            .remote()
            .and_then(|remote| remote.prefix())
            .map(str::to_string);
        let remote = object_store.map(|store| RemoteCache::new(store, prefix));

        let cache = CacheManager::new(local, remote, config.cache_mode(), config.event_channel());

        let ctx = SharedContext {
            graph: graph.clone(),
            cache: Arc::new(cache),
            records: Arc::new(RunRecords::new(config.state_root())),
            conditions: Arc::new(
                ConditionEvaluator::new(config.env(), config.debug())
                    .with_root(config.root().clone()),
            ),
            fingerprinter: Fingerprinter::new(),
            selector,
            event_channel: config.event_channel(),
            base_env: config.env(),
            root: config.root().clone(),
            debug: config.debug(),
            stop_on_failure: config.stop_on_failure(),
        };

        let scheduler = Scheduler::new(ctx, config.jobs());

        Ok(Self {
            config,
            graph,
            scheduler,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    #[instrument(name = "Engine::run", skip(self, cancel))]
    pub async fn run(
        &self,
        selection: &Selection,
        cancel: CancellationToken,
    ) -> Result<RunReport, EngineError> {
        let order = self.graph.select(selection)?;
        debug!("Selected {} rules", order.len());
        Ok(self.scheduler.run(&order, cancel).await)
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Could not use {root:?} as the repository root: {err}")]
    InvalidRoot { root: PathBuf, err: std::io::Error },

    #[error(transparent)]
    GraphError(GraphError),
}

impl From<GraphError> for EngineError {
    fn from(err: GraphError) -> Self {
        Self::GraphError(err)
    }
}
