use reqwest::StatusCode;
use revpurge_common::document::Revision;

#[derive(Debug, thiserror::Error)]
pub enum CouchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{resource} not found")]
    NotFound { resource: String },
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("malformed JSON payload: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("document body has no string '_id'")]
    MissingDocumentId,
    #[error("invalid instance URL '{0}'")]
    InvalidUrl(String),
}

impl CouchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// A per-revision operation inside a batch failed; the rest of the batch was skipped.
#[derive(Debug, thiserror::Error)]
#[error("{revision}: {source}")]
pub struct BatchFailure {
    pub revision: Revision,
    #[source]
    pub source: CouchError,
}
