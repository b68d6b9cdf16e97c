pub mod discover;
pub mod purge;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use revpurge_common::config::Config;
use revpurge_core::network::tcp::TcpProbe;
use revpurge_core::scanner::NetworkScanner;
use tracing::info_span;

use crate::terminal::spinner;

#[derive(Parser)]
#[command(name = "revpurge")]
#[command(about = "Finds CouchDB instances on a network and purges revision history.")]
pub struct CommandLine {
    /// JSON configuration file
    #[arg(long, default_value = "config.json")]
    pub config: PathBuf,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Find CouchDB instances in the configured network block
    #[command(alias = "d")]
    Discover,
    /// Discover instances, then run the revision purge on each
    #[command(alias = "p")]
    Purge(PurgeArgs),
}

#[derive(Args)]
pub struct PurgeArgs {
    /// Database to purge on every instance
    #[arg(long)]
    pub dbname: String,
    /// Document to reset; defaults to the database name
    #[arg(long)]
    pub doc_id: Option<String>,
    /// Stop at the first instance that fails
    #[arg(long)]
    pub fail_fast: bool,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

pub fn build_scanner(cfg: &Config) -> NetworkScanner {
    NetworkScanner::new(Arc::new(TcpProbe::new(cfg.probe_timeout())))
        .with_concurrency_limit(cfg.max_concurrent_probes.unwrap_or(0))
        .on_host_found(spinner::report_discovery_progress)
        .with_span(info_span!("discovery", cidr = %cfg.cidr))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
