use std::time::{Duration, Instant};

use anyhow::bail;
use colored::*;
use revpurge_common::config::Config;
use revpurge_core::maintenance::{
    FailurePolicy, MaintenanceService, MaintenanceSettings, RunSummary,
};
use tracing::debug;

use crate::commands::{PurgeArgs, build_scanner};
use crate::mprint;
use crate::terminal::{colors, format, print, spinner};

pub async fn purge(args: PurgeArgs, cfg: &Config) -> anyhow::Result<()> {
    let settings = settings_from(args, cfg)?;
    debug!(
        "Inventory endpoint {} is configured; instance count check is disabled",
        cfg.api_endpoint
    );

    let port = settings.port;
    print::aligned_line("Network", cfg.cidr.as_str());
    print::aligned_line("Database", settings.db_name.as_str());
    print::aligned_line("Document", settings.doc_id.as_str());
    mprint!();
    let service = MaintenanceService::new(build_scanner(cfg), settings)?;

    spinner::get_spinner().set_message(format!("Probing {} on port {port}...", cfg.cidr));
    let start_time: Instant = Instant::now();
    let result = service.run(&cfg.cidr).await;
    spinner::get_spinner().finish_and_clear();

    let summary: RunSummary = result?;
    maintenance_ends(&summary, port, start_time.elapsed());

    if !summary.all_succeeded() {
        bail!(
            "{} of {} instances failed",
            summary.failed().count(),
            summary.discovered()
        );
    }
    Ok(())
}

fn settings_from(args: PurgeArgs, cfg: &Config) -> anyhow::Result<MaintenanceSettings> {
    let mut settings = MaintenanceSettings::new(args.dbname, cfg.port()?);
    if let Some(doc_id) = args.doc_id {
        settings.doc_id = doc_id;
    }
    settings.request_timeout = cfg.request_timeout();
    if args.fail_fast {
        settings.policy = FailurePolicy::FailFast;
    }
    Ok(settings)
}

fn maintenance_ends(summary: &RunSummary, port: u16, total_time: Duration) {
    if summary.outcomes.is_empty() {
        print::header("ZERO INSTANCES DETECTED");
        print::no_results();
        return;
    }

    mprint!();
    print::header("Revision Purge");
    for (idx, outcome) in summary.outcomes.iter().enumerate() {
        print::tree_head(idx, &outcome.host.to_string());
        let mut details = vec![format::instance_url(&outcome.host, port)];
        match &outcome.result {
            Ok(report) => details.extend(format::report_to_detail(report)),
            Err(err) => details.extend(format::failure_to_detail(err)),
        }
        print::as_tree_one_level(details);
        if idx + 1 != summary.outcomes.len() {
            mprint!();
        }
    }
    print_summary(summary, total_time);
}

fn print_summary(summary: &RunSummary, total_time: Duration) {
    let purged: ColoredString = format!("{}/{} instances", summary.succeeded(), summary.discovered())
        .bold()
        .green();
    let total_time: ColoredString = format!("{:.2}s", total_time.as_secs_f64()).bold().yellow();
    let output: ColoredString =
        format!("Purge Complete: {purged} purged in {total_time}").color(colors::TEXT_DEFAULT);

    print::fat_separator();
    print::centerln(&output);
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
