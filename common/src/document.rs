//! # Documents and Revisions
//!
//! CouchDB documents are schemaless, so they are kept as insertion-ordered JSON
//! objects and only the reserved `_id` / `_rev` fields are interpreted.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const ID_FIELD: &str = "_id";
pub const REV_FIELD: &str = "_rev";

/// Generations strictly above this value are considered abnormally high.
pub const HIGH_GENERATION_THRESHOLD: u64 = 100_000;

/// An arbitrary JSON document body. Key order is preserved on round-trips.
pub type Document = Map<String, Value>;

/// Returns the document's `_id` if it is present and a string.
pub fn document_id(doc: &Document) -> Option<&str> {
    doc.get(ID_FIELD).and_then(Value::as_str)
}

/// Removes `_rev` so the body can be written as a brand new document.
pub fn strip_revision(doc: &mut Document) -> Option<Value> {
    doc.shift_remove(REV_FIELD)
}

/// A revision id such as `3-917fa2381192822767f010b95b45325b`.
///
/// The text before the first `-` is the generation; revisions order by
/// generation first, then by the full id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionId(String);

impl RevisionId {
    pub fn new(rev: impl Into<String>) -> Self {
        Self(rev.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The leading integer of the id, or `None` if it is not a number.
    pub fn generation(&self) -> Option<u64> {
        let head = self.0.split_once('-').map_or(self.0.as_str(), |(g, _)| g);
        head.parse().ok()
    }

    pub fn is_high_generation(&self) -> bool {
        self.generation()
            .is_some_and(|generation| generation > HIGH_GENERATION_THRESHOLD)
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RevisionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RevisionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Ord for RevisionId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.generation()
            .cmp(&other.generation())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for RevisionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A single revision of a single document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision {
    pub doc_id: String,
    pub rev: RevisionId,
}

impl Revision {
    pub fn new(doc_id: impl Into<String>, rev: impl Into<RevisionId>) -> Self {
        Self {
            doc_id: doc_id.into(),
            rev: rev.into(),
        }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.doc_id, self.rev)
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
