use crate::terminal::colors;
use colored::*;
use revpurge_core::couchdb::{DocumentDeletion, PurgeReport, WorkflowError};

pub type Detail = (String, ColoredString);

pub fn instance_url(host: &std::net::Ipv4Addr, port: u16) -> Detail {
    let value = format!("http://{host}:{port}").color(colors::IPV4_ADDR);
    (String::from("Instance"), value)
}

pub fn report_to_detail(report: &PurgeReport) -> Vec<Detail> {
    let mut details: Vec<Detail> = vec![(String::from("Document"), report.doc_id.as_str().bold())];

    details.push((
        String::from("Revisions"),
        format!(
            "{} deleted, {} already gone",
            report.revisions.deleted, report.revisions.already_gone
        )
        .normal(),
    ));

    let document = match &report.document {
        DocumentDeletion::Deleted { rev } => format!("deleted at {rev}").normal(),
        DocumentDeletion::AlreadyAbsent => "already absent".dimmed(),
    };
    details.push((String::from("Reset"), document));
    details.push((
        String::from("Recreated"),
        report.recreated_rev.to_string().color(colors::REVISION),
    ));
    details.push((
        String::from("Index"),
        format!("{} ({})", report.index_rev, report.index_clearance).normal(),
    ));
    details.push((
        String::from("High gen"),
        report.high_generation_docs.to_string().color(colors::ACCENT),
    ));
    details.push((
        String::from("Conflicts"),
        format!("{} deleted", report.conflicts_deleted).normal(),
    ));
    details.push((String::from("Compaction"), "accepted".green()));

    details
}

pub fn failure_to_detail(err: &WorkflowError) -> Vec<Detail> {
    let mut details: Vec<Detail> = vec![(
        String::from("Failed at"),
        format!("[{}/10] {}", err.step.number(), err.step).color(colors::FAILURE),
    )];

    if let Some(revision) = &err.revision {
        details.push((
            String::from("Revision"),
            revision.to_string().color(colors::REVISION),
        ));
    }

    details.push((
        String::from("Cause"),
        err.source.to_string().color(colors::FAILURE),
    ));
    details
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
