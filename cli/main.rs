mod commands;
pub mod flags;
mod reporter;

use commands::*;
use structopt::StructOpt;
use tracing::{error, log};

#[derive(StructOpt, Debug, Clone)]
#[structopt(
    name = "strata",
    setting = structopt::clap::AppSettings::ColoredHelp,
    about = "Builds the components of a repository, running only what changed"
)]
struct Strata {
    #[structopt(subcommand, help = "the command to run")]
    cmd: Option<Command>,
}

impl Strata {
    async fn run(mut self) -> Result<bool, anyhow::Error> {
        human_panic::setup_panic!(Metadata {
            name: "strata".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            authors: "The Strata Authors".into(),
            homepage: "".into(),
        });

        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .format_timestamp_micros()
            .format_module_path(false)
            .parse_env("STRATA_LOG")
            .try_init()?;

        let result = self
            .cmd
            .take()
            .unwrap_or_else(|| Command::Build(BuildCommand::all()))
            .run()
            .await;

        if let Err(ref err) = result {
            error!("{:?}", &err);
        };

        result
    }
}

#[derive(StructOpt, Debug, Clone)]
enum Command {
    Build(BuildCommand),
}

impl Command {
    async fn run(self) -> Result<bool, anyhow::Error> {
        match self {
            Command::Build(x) => x.run().await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    if !Strata::from_args().run().await? {
        std::process::exit(1);
    }
    Ok(())
}
