//! # Address Blocks
//!
//! Expands an IPv4 block in prefix notation (e.g. `192.168.1.0/24`) into the
//! hosts that can actually carry a service: everything between the network
//! address and the broadcast address, both excluded.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use pnet::ipnetwork::Ipv4Network;

/// Returned when a block string cannot be turned into an [`AddressBlock`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid network block '{input}': {reason}")]
pub struct NetworkParseError {
    pub input: String,
    pub reason: String,
}

impl NetworkParseError {
    fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// An inclusive range of IPv4 addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Range {
    pub start_addr: Ipv4Addr,
    pub end_addr: Ipv4Addr,
}

impl Ipv4Range {
    pub fn new(start_addr: Ipv4Addr, end_addr: Ipv4Addr) -> Self {
        Self {
            start_addr,
            end_addr,
        }
    }

    pub fn to_iter(&self) -> impl Iterator<Item = Ipv4Addr> + use<> {
        let start: u32 = self.start_addr.into();
        let end: u32 = self.end_addr.into();
        (start..=end).map(Ipv4Addr::from)
    }

    pub fn len(&self) -> u64 {
        let start: u32 = self.start_addr.into();
        let end: u32 = self.end_addr.into();
        if end < start {
            return 0;
        }
        u64::from(end - start) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A network prefix plus mask, e.g. `10.0.0.0/30`.
///
/// Host bits in the parsed address are masked away, so `192.168.1.77/24`
/// describes the same block as `192.168.1.0/24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressBlock {
    network: Ipv4Network,
}

impl AddressBlock {
    pub fn new(ip: Ipv4Addr, prefix: u8) -> Result<Self, NetworkParseError> {
        let network = Ipv4Network::new(ip, prefix)
            .map_err(|e| NetworkParseError::new(&format!("{ip}/{prefix}"), e.to_string()))?;
        Ok(Self { network })
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network.network()
    }

    pub fn broadcast(&self) -> Ipv4Addr {
        self.network.broadcast()
    }

    pub fn prefix(&self) -> u8 {
        self.network.prefix()
    }

    /// The range strictly between the network and broadcast addresses.
    ///
    /// `None` for /31 and /32, which have no such addresses.
    pub fn usable_range(&self) -> Option<Ipv4Range> {
        if self.prefix() >= 31 {
            return None;
        }
        let start: u32 = u32::from(self.network()) + 1;
        let end: u32 = u32::from(self.broadcast()) - 1;
        Some(Ipv4Range::new(Ipv4Addr::from(start), Ipv4Addr::from(end)))
    }

    /// Every usable host of the block, in ascending address order.
    pub fn hosts(&self) -> impl Iterator<Item = Ipv4Addr> + use<> {
        self.usable_range()
            .into_iter()
            .flat_map(|range| range.to_iter())
    }

    pub fn host_count(&self) -> u64 {
        self.usable_range().map_or(0, |range| range.len())
    }
}

impl FromStr for AddressBlock {
    type Err = NetworkParseError;

    /// Parses CIDR notation like "192.168.1.0/24".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let Some((ip_str, prefix_str)) = trimmed.split_once('/') else {
            return Err(NetworkParseError::new(s, "missing '/<prefix>'"));
        };

        let ipv4_addr = match ip_str.parse::<IpAddr>() {
            Ok(IpAddr::V4(v4)) => v4,
            Ok(IpAddr::V6(_)) => {
                return Err(NetworkParseError::new(s, "IPv6 blocks are not supported"));
            }
            Err(e) => {
                return Err(NetworkParseError::new(s, format!("invalid IP '{ip_str}': {e}")));
            }
        };

        let prefix = prefix_str
            .parse::<u8>()
            .map_err(|e| NetworkParseError::new(s, format!("invalid prefix '{prefix_str}': {e}")))?;

        let network = Ipv4Network::new(ipv4_addr, prefix)
            .map_err(|e| NetworkParseError::new(s, e.to_string()))?;

        Ok(Self { network })
    }
}

impl fmt::Display for AddressBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network(), self.prefix())
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
