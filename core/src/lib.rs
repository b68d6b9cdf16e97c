//! Discovery and maintenance engine for `revpurge`.
//!
//! * [`network`]: the TCP liveness probe.
//! * [`scanner`]: concurrent fan-out of probes over an address block.
//! * [`couchdb`]: the HTTP client and the ten-step revision purge workflow.
//! * [`maintenance`]: runs the workflow once per discovered instance.

pub mod couchdb;
pub mod maintenance;
pub mod network;
pub mod scanner;
