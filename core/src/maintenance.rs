//! # Maintenance Service
//!
//! Ties discovery and the purge workflow together: scan the block once, then
//! run one [`RevisionPurgeClient`] per discovered instance, one instance at a
//! time. Instances share nothing but the HTTP connection pool.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::time::Duration;

use reqwest::Client;
use revpurge_common::config::DEFAULT_REQUEST_TIMEOUT;
use revpurge_common::network::NetworkParseError;
use tracing::{error, info, info_span, warn};

use crate::couchdb::{CouchError, PurgeOutcome, RevisionPurgeClient, WorkflowError};
use crate::scanner::NetworkScanner;

/// What to do when one instance's workflow fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Record the failure and carry on with the next instance.
    #[default]
    Isolate,
    /// Abort the whole run on the first failed instance.
    FailFast,
}

#[derive(Debug, Clone)]
pub struct MaintenanceSettings {
    pub db_name: String,
    pub doc_id: String,
    pub port: u16,
    pub request_timeout: Duration,
    pub policy: FailurePolicy,
}

impl MaintenanceSettings {
    /// Targets the document named after the database, on `port`.
    pub fn new(db_name: impl Into<String>, port: u16) -> Self {
        let db_name: String = db_name.into();
        Self {
            doc_id: db_name.clone(),
            db_name,
            port,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            policy: FailurePolicy::default(),
        }
    }
}

#[derive(Debug)]
pub struct InstanceOutcome {
    pub host: Ipv4Addr,
    pub result: PurgeOutcome,
}

impl InstanceOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<InstanceOutcome>,
}

impl RunSummary {
    pub fn discovered(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &InstanceOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(InstanceOutcome::is_success)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MaintenanceError {
    #[error(transparent)]
    Scan(#[from] NetworkParseError),
    #[error("instance {host} failed: {source}")]
    Instance {
        host: Ipv4Addr,
        #[source]
        source: WorkflowError,
    },
}

pub struct MaintenanceService {
    scanner: NetworkScanner,
    settings: MaintenanceSettings,
    http: Client,
}

impl MaintenanceService {
    pub fn new(scanner: NetworkScanner, settings: MaintenanceSettings) -> Result<Self, CouchError> {
        let http = Client::builder().timeout(settings.request_timeout).build()?;
        Ok(Self {
            scanner,
            settings,
            http,
        })
    }

    /// Scans `block` for instances listening on the configured port.
    pub async fn discover(&self, block: &str) -> Result<BTreeSet<Ipv4Addr>, NetworkParseError> {
        self.scanner.scan(block, self.settings.port).await
    }

    /// Scans `block`, then purges every instance found, in address order.
    pub async fn run(&self, block: &str) -> Result<RunSummary, MaintenanceError> {
        let hosts = self.discover(block).await?;
        info!("Found {} CouchDB instances on the network", hosts.len());

        let mut summary = RunSummary::default();
        if hosts.is_empty() {
            warn!("No CouchDB instances found");
            return Ok(summary);
        }

        for host in hosts {
            let result = match self.purge_instance(host).await {
                Ok(report) => Ok(report),
                Err(source) => {
                    error!("Instance {host} failed: {source}");
                    if self.settings.policy == FailurePolicy::FailFast {
                        return Err(MaintenanceError::Instance { host, source });
                    }
                    Err(source)
                }
            };
            summary.outcomes.push(InstanceOutcome { host, result });
        }

        info!(
            "Maintenance finished: {}/{} instances purged",
            summary.succeeded(),
            summary.discovered()
        );
        Ok(summary)
    }

    /// Runs the full workflow against `host`.
    pub async fn purge_instance(&self, host: Ipv4Addr) -> PurgeOutcome {
        self.client_for(host).run(&self.settings.doc_id).await
    }

    pub fn client_for(&self, host: Ipv4Addr) -> RevisionPurgeClient {
        let base_url = format!("http://{host}:{}", self.settings.port);
        let span = info_span!("instance", %host, db = %self.settings.db_name);
        RevisionPurgeClient::with_client(self.http.clone(), base_url, &self.settings.db_name)
            .with_span(span)
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
