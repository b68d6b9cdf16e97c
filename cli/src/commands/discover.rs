use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use colored::*;
use revpurge_common::config::Config;

use crate::commands::build_scanner;
use crate::mprint;
use crate::terminal::{colors, format, print, spinner};

pub async fn discover(cfg: &Config) -> anyhow::Result<()> {
    let port = cfg.port()?;
    let scanner = build_scanner(cfg);
    print::aligned_line("Network", cfg.cidr.as_str());
    print::aligned_line("Port", port.to_string());
    mprint!();

    spinner::get_spinner().set_message(format!("Probing {} on port {port}...", cfg.cidr));
    let start_time: Instant = Instant::now();
    let result = scanner.scan(&cfg.cidr, port).await;
    spinner::get_spinner().finish_and_clear();

    let hosts: BTreeSet<Ipv4Addr> = result?;
    discovery_ends(&hosts, port, start_time.elapsed());
    Ok(())
}

fn discovery_ends(hosts: &BTreeSet<Ipv4Addr>, port: u16, total_time: Duration) {
    if hosts.is_empty() {
        print::header("ZERO INSTANCES DETECTED");
        print::no_results();
        return;
    }

    mprint!();
    print::header("CouchDB Discovery");
    for (idx, host) in hosts.iter().enumerate() {
        print::tree_head(idx, &host.to_string());
        print::as_tree_one_level(vec![format::instance_url(host, port)]);
        if idx + 1 != hosts.len() {
            mprint!();
        }
    }
    print_summary(hosts.len(), total_time);
}

fn print_summary(found: usize, total_time: Duration) {
    let instances: ColoredString = format!("{found} CouchDB instances").bold().green();
    let total_time: ColoredString = format!("{:.2}s", total_time.as_secs_f64()).bold().yellow();
    let output: ColoredString = format!("Discovery Complete: {instances} found in {total_time}")
        .color(colors::TEXT_DEFAULT);

    print::fat_separator();
    print::centerln(&output);
}
