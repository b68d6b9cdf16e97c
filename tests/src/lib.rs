//! Cross-crate tests for revpurge. Everything here runs against loopback.

#[cfg(test)]
mod couch;
#[cfg(test)]
mod maintenance;
