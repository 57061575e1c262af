use super::*;
use crate::reporter::{print_summary, StatusReporter};
use std::sync::Arc;
use strata_core::store::{download_source, ObjectStore, S3ObjectStore};
use strata_core::Engine;
use structopt::StructOpt;
use tokio_util::sync::CancellationToken;
use tracing::*;

#[derive(StructOpt, Debug, Clone)]
#[structopt(
    name = "build",
    setting = structopt::clap::AppSettings::ColoredHelp,
    about = "Build the rules of this repository",
)]
pub struct BuildCommand {
    #[structopt(flatten)]
    flags: Flags,
}

impl BuildCommand {
    pub fn all() -> BuildCommand {
        BuildCommand {
            flags: Flags::default(),
        }
    }

    /// Returns whether every rule succeeded.
    pub async fn run(self) -> Result<bool, anyhow::Error> {
        let remote = self.flags.remote()?;

        let cancel = CancellationToken::new();
        let on_ctrl_c = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling the run");
                on_ctrl_c.cancel();
            }
        });

        // Dropping the workspace deletes the downloaded sources, so it lives until the end.
        let (root, _workspace) = match &self.flags.source {
            Some(key) => {
                let store: Option<Arc<dyn ObjectStore>> = match &remote {
                    Some(remote) => {
                        let store: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::new(remote).await);
                        Some(store)
                    }
                    None => None,
                };
                let workspace = download_source(store.as_deref(), key, &cancel).await?;
                info!("Building sources from {} in {:?}", key, workspace.path());
                (workspace.path().to_path_buf(), Some(workspace))
            }
            None => (self.flags.repository_root()?, None),
        };

        let config = self.flags.config(root, remote)?;
        let event_channel = config.event_channel();
        let engine = Engine::new(config).await?;

        let selection = self.flags.selection()?;
        let reporter = tokio::spawn(StatusReporter::new(&event_channel).run());
        let report = engine.run(&selection, cancel).await;
        if report.is_err() {
            reporter.abort();
        }
        if let Err(err) = reporter.await {
            debug!("Status reporter stopped early: {}", err);
        }

        let report = report?;
        print_summary(&report);
        Ok(report.is_success())
    }
}
