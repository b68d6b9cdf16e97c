//! Concurrent discovery of listening instances across an address block.
//!
//! One task is spawned per candidate host; every task writes into a shared,
//! mutex-guarded set and the scan returns only after all of them have been
//! joined. An optional cap turns the fan-out into a bounded pool.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, PoisonError};

use revpurge_common::network::{AddressBlock, NetworkParseError};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

use crate::network::tcp::LivenessProbe;

/// Invoked with the running total each time a host answers.
pub type HostFoundCallback = Arc<dyn Fn(usize) + Send + Sync>;

pub struct NetworkScanner {
    probe: Arc<dyn LivenessProbe>,
    max_concurrent: Option<usize>,
    on_host_found: Option<HostFoundCallback>,
    span: Span,
}

impl NetworkScanner {
    pub fn new(probe: Arc<dyn LivenessProbe>) -> Self {
        Self {
            probe,
            max_concurrent: None,
            on_host_found: None,
            span: info_span!("scan"),
        }
    }

    /// Limits in-flight probes. `0` removes the limit.
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.max_concurrent = (limit > 0).then_some(limit);
        self
    }

    pub fn on_host_found(mut self, callback: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_host_found = Some(Arc::new(callback));
        self
    }

    /// Replaces the span every scan event is recorded under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Parses `block` and probes every usable host in it on `port`.
    ///
    /// A malformed block is returned as an error before any probe starts.
    pub async fn scan(
        &self,
        block: &str,
        port: u16,
    ) -> Result<BTreeSet<Ipv4Addr>, NetworkParseError> {
        let block: AddressBlock = block.parse().inspect_err(|e| {
            let _guard = self.span.enter();
            error!("Error parsing network block: {e}");
        })?;
        Ok(self.scan_block(&block, port).await)
    }

    pub async fn scan_block(&self, block: &AddressBlock, port: u16) -> BTreeSet<Ipv4Addr> {
        self.fan_out(block, port).instrument(self.span.clone()).await
    }

    async fn fan_out(&self, block: &AddressBlock, port: u16) -> BTreeSet<Ipv4Addr> {
        if block.usable_range().is_none_or(|range| range.is_empty()) {
            warn!("{block} has no usable host addresses, nothing to scan");
            return BTreeSet::new();
        }
        info!(
            "Starting concurrent scan of {block} ({} hosts) on port {port}",
            block.host_count()
        );

        let found: Arc<Mutex<BTreeSet<Ipv4Addr>>> = Arc::new(Mutex::new(BTreeSet::new()));
        let limiter: Option<Arc<Semaphore>> = self.max_concurrent.map(|n| Arc::new(Semaphore::new(n)));
        let mut tasks: JoinSet<()> = JoinSet::new();

        for host in block.hosts() {
            let permit = match &limiter {
                Some(semaphore) => Arc::clone(semaphore).acquire_owned().await.ok(),
                None => None,
            };

            let probe = Arc::clone(&self.probe);
            let found = Arc::clone(&found);
            let callback = self.on_host_found.clone();

            tasks.spawn(
                async move {
                    let _permit = permit;
                    debug!("Scanning {host}");
                    if !probe.is_reachable(host, port).await {
                        return;
                    }

                    let total = {
                        let mut hosts = found.lock().unwrap_or_else(PoisonError::into_inner);
                        hosts.insert(host);
                        hosts.len()
                    };
                    info!("Instance listening on {host}:{port}");
                    if let Some(callback) = callback {
                        callback(total);
                    }
                }
                .in_current_span(),
            );

            while let Some(done) = tasks.try_join_next() {
                log_join_failure(done);
            }
        }

        while let Some(done) = tasks.join_next().await {
            log_join_failure(done);
        }

        let hosts = std::mem::take(&mut *found.lock().unwrap_or_else(PoisonError::into_inner));
        info!("Network scan completed: {} reachable", hosts.len());
        hosts
    }
}

fn log_join_failure(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        warn!("Probe task failed, host treated as unreachable: {e}");
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
