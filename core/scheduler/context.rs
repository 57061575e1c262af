use super::{InFlight, RuleQueue, RuleResults};
use crate::cache::{CacheManager, Fingerprinter};
use crate::condition::ConditionEvaluator;
use crate::events::EventChannel;
use crate::executor::ExecutorSelector;
use crate::graph::Graph;
use crate::state::RunRecords;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Everything a worker needs that lives as long as the scheduler.
///
#[derive(Clone)]
pub struct SharedContext {
    pub graph: Arc<Graph>,
    pub cache: Arc<CacheManager>,
    pub records: Arc<RunRecords>,
    pub conditions: Arc<ConditionEvaluator>,
    pub fingerprinter: Fingerprinter,
    pub selector: Arc<dyn ExecutorSelector>,
    pub event_channel: Arc<EventChannel>,
    pub base_env: Arc<BTreeMap<String, String>>,
    /// The repository root, mounted into containers.
    pub root: PathBuf,
    pub debug: bool,
    pub stop_on_failure: bool,
}

/// State scoped to a single run.
///
#[derive(Debug)]
pub struct RunState {
    pub queue: RuleQueue,
    pub results: RuleResults,
    pub in_flight: InFlight,
}
