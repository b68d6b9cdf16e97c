//! # Configuration
//!
//! Loaded from a JSON file (default `config.json`):
//!
//! ```json
//! {
//!   "logfile": "revpurge.log",
//!   "cidr": "192.168.1.0/24",
//!   "couchdbPort": "5984",
//!   "apiEndpoint": "http://inventory.local/api/couchdb"
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("'{0}' must not be blank")]
    MissingField(&'static str),
    #[error("'couchdbPort' is not a valid port: {0}")]
    InvalidPort(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Append-only log destination.
    #[serde(rename = "logfile", default)]
    pub log_file: String,
    #[serde(default)]
    pub cidr: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub couchdb_port: String,
    /// Inventory endpoint reporting the expected instance count.
    ///
    /// Required, but the count comparison is disabled; nothing queries it.
    #[serde(default)]
    pub api_endpoint: String,
    #[serde(default)]
    pub probe_timeout_ms: Option<u64>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// Caps concurrent probes. Unset means one task per host.
    #[serde(default)]
    pub max_concurrent_probes: Option<usize>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Checks the fields the tool cannot run without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cidr.trim().is_empty() {
            return Err(ConfigError::MissingField("cidr"));
        }
        if self.couchdb_port.trim().is_empty() {
            return Err(ConfigError::MissingField("couchdbPort"));
        }
        if self.api_endpoint.trim().is_empty() {
            return Err(ConfigError::MissingField("apiEndpoint"));
        }
        self.port()?;
        Ok(())
    }

    pub fn port(&self) -> Result<u16, ConfigError> {
        self.couchdb_port
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort(self.couchdb_port.clone()))
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout_ms
            .map_or(DEFAULT_PROBE_TIMEOUT, Duration::from_millis)
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout_secs
            .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_secs)
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Text(String),
        Number(u64),
    }

    Ok(match Port::deserialize(deserializer)? {
        Port::Text(text) => text,
        Port::Number(number) => number.to_string(),
    })
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
