mod commands;
mod terminal;

use anyhow::Context;
use commands::{CommandLine, Commands, discover, purge};
use revpurge_common::config::Config;
use terminal::{logging, print};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    let cfg = Config::load(&commands.config)
        .with_context(|| format!("Failed to load configuration from {}", commands.config.display()))?;
    cfg.validate().context("Invalid configuration")?;

    logging::init(&cfg.log_file)?;
    print::banner();

    match commands.command {
        Commands::Discover => {
            print::header("getting ready for discovery");
            discover::discover(&cfg).await
        }
        Commands::Purge(args) => {
            print::header("starting revision purge");
            purge::purge(args, &cfg).await
        }
    }
}
