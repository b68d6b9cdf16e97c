//! Shared models for `revpurge`: address blocks, CouchDB documents and revisions,
//! and the JSON configuration file.

pub mod config;
pub mod document;
pub mod network;
