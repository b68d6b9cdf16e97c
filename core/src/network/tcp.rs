use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use async_trait::async_trait;
use revpurge_common::config::DEFAULT_PROBE_TIMEOUT;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

/// Decides whether something is listening on `addr:port`.
///
/// Implementations must never fail: every error collapses to `false`.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn is_reachable(&self, addr: Ipv4Addr, port: u16) -> bool;
}

/// Plain closures work as probes, which keeps scanner tests free of sockets.
#[async_trait]
impl<F> LivenessProbe for F
where
    F: Fn(Ipv4Addr, u16) -> bool + Send + Sync,
{
    async fn is_reachable(&self, addr: Ipv4Addr, port: u16) -> bool {
        (self)(addr, port)
    }
}

/// Full TCP handshake with a bounded wait.
#[derive(Debug, Clone, Copy)]
pub struct TcpProbe {
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

#[async_trait]
impl LivenessProbe for TcpProbe {
    async fn is_reachable(&self, addr: Ipv4Addr, port: u16) -> bool {
        let socket_addr = SocketAddr::V4(SocketAddrV4::new(addr, port));

        // The stream is dropped at the end of each arm; on timeout the
        // pending connect future is dropped with it.
        match timeout(self.timeout, TcpStream::connect(socket_addr)).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                trace!("{socket_addr} refused: {e}");
                false
            }
            Err(_elapsed) => {
                trace!("{socket_addr} timed out after {:?}", self.timeout);
                false
            }
        }
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
