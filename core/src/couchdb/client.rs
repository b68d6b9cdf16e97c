//! HTTP operations against a single CouchDB database.
//!
//! Each method maps to one request (or one GET/DELETE pair) of the purge
//! workflow. They are public so individual steps can be driven on their own.

use std::fmt;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode, Url};
use revpurge_common::document::{self, Document, Revision, RevisionId};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{Span, debug, info, info_span, warn};

use super::design::{ConflictRow, DesignIndex, ViewResponse};
use super::error::{BatchFailure, CouchError};

/// Runs the purge workflow against one database on one instance.
///
/// Holds nothing but the HTTP handle, the instance base URL and the database
/// name; consecutive runs do not influence each other.
#[derive(Debug, Clone)]
pub struct RevisionPurgeClient {
    http: Client,
    base_url: String,
    db_name: String,
    pub(super) span: Span,
}

/// Outcome of deleting every recorded revision of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevisionDeletion {
    pub deleted: usize,
    pub already_gone: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentDeletion {
    Deleted { rev: RevisionId },
    AlreadyAbsent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexClearance {
    Deleted { rev: RevisionId },
    NotPresent,
}

impl fmt::Display for IndexClearance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deleted { .. } => f.write_str("Existing design document deleted"),
            Self::NotPresent => f.write_str("Design document does not exist, no deletion needed"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RevsInfoBody {
    #[serde(rename = "_revs_info", default)]
    revs_info: Vec<RevInfo>,
}

#[derive(Debug, Deserialize)]
struct RevInfo {
    rev: RevisionId,
}

#[derive(Debug, Deserialize)]
struct CurrentRev {
    #[serde(rename = "_rev")]
    rev: RevisionId,
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
    rev: RevisionId,
}

impl RevisionPurgeClient {
    /// Builds a client with its own connection pool and a per-request deadline.
    pub fn new(
        base_url: impl Into<String>,
        db_name: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, CouchError> {
        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(Self::with_client(http, base_url, db_name))
    }

    pub fn with_client(http: Client, base_url: impl Into<String>, db_name: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        let db_name: String = db_name.into();
        let span = info_span!("purge", instance = %base_url, db = %db_name);
        Self {
            http,
            base_url,
            db_name,
            span,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    /// `GET /{db}/{id}`
    pub async fn fetch_document(&self, doc_id: &str) -> Result<Document, CouchError> {
        let resp = self.http.get(self.endpoint(&[doc_id])?).send().await?;
        match resp.status() {
            StatusCode::OK => read_json(resp).await,
            StatusCode::NOT_FOUND => Err(not_found(format!("document '{doc_id}'"))),
            _ => Err(status_error(resp).await),
        }
    }

    /// `GET /{db}/{id}?revs_info=true`, every revision id in server order.
    pub async fn fetch_revision_history(&self, doc_id: &str) -> Result<Vec<RevisionId>, CouchError> {
        let resp = self
            .http
            .get(self.endpoint(&[doc_id])?)
            .query(&[("revs_info", "true")])
            .send()
            .await?;
        match resp.status() {
            StatusCode::OK => {
                let body: RevsInfoBody = read_json(resp).await?;
                Ok(body.revs_info.into_iter().map(|info| info.rev).collect())
            }
            StatusCode::NOT_FOUND => Err(not_found(format!("document '{doc_id}'"))),
            _ => Err(status_error(resp).await),
        }
    }

    /// `DELETE /{db}/{id}?rev={rev}`
    pub async fn delete_revision(&self, doc_id: &str, rev: &RevisionId) -> Result<(), CouchError> {
        let resp = self
            .http
            .delete(self.endpoint(&[doc_id])?)
            .query(&[("rev", rev.as_str())])
            .send()
            .await?;
        match resp.status() {
            StatusCode::OK | StatusCode::ACCEPTED => Ok(()),
            StatusCode::NOT_FOUND => Err(not_found(format!("revision {doc_id}@{rev}"))),
            _ => Err(status_error(resp).await),
        }
    }

    /// Deletes `revisions` one by one, in order.
    ///
    /// A revision that is already gone counts as done. Any other failure stops
    /// the batch and names the revision it stopped at.
    pub async fn delete_revisions(
        &self,
        doc_id: &str,
        revisions: &[RevisionId],
    ) -> Result<RevisionDeletion, BatchFailure> {
        let mut outcome = RevisionDeletion::default();
        for rev in revisions {
            match self.delete_revision(doc_id, rev).await {
                Ok(()) => {
                    debug!("Deleted revision {rev}");
                    outcome.deleted += 1;
                }
                Err(e) if e.is_not_found() => {
                    debug!("Revision {rev} is already deleted, skipping");
                    outcome.already_gone += 1;
                }
                Err(source) => {
                    return Err(BatchFailure {
                        revision: Revision::new(doc_id, rev.clone()),
                        source,
                    });
                }
            }
        }
        Ok(outcome)
    }

    /// Deletes the document at whatever revision is current right now.
    pub async fn delete_document(&self, doc_id: &str) -> Result<DocumentDeletion, CouchError> {
        let current: CurrentRev = match self.fetch_document(doc_id).await {
            Ok(doc) => serde_json::from_value(doc.into())?,
            Err(e) if e.is_not_found() => return Ok(DocumentDeletion::AlreadyAbsent),
            Err(e) => return Err(e),
        };

        match self.delete_revision(doc_id, &current.rev).await {
            Ok(()) => Ok(DocumentDeletion::Deleted { rev: current.rev }),
            Err(e) if e.is_not_found() => Ok(DocumentDeletion::AlreadyAbsent),
            Err(e) => Err(e),
        }
    }

    /// `PUT /{db}/{id}` with the body minus `_rev`. Returns the new revision.
    pub async fn recreate_document(&self, mut doc: Document) -> Result<RevisionId, CouchError> {
        document::strip_revision(&mut doc);
        let doc_id = document::document_id(&doc)
            .ok_or(CouchError::MissingDocumentId)?
            .to_string();
        self.put_json(&[doc_id.as_str()], &doc).await
    }

    /// Removes a same-named design document if one exists.
    pub async fn clear_design_index(&self, index: &DesignIndex) -> Result<IndexClearance, CouchError> {
        let url = self.endpoint(&["_design", index.name.as_str()])?;
        let resp = self.http.get(url.clone()).send().await?;
        let current: CurrentRev = match resp.status() {
            StatusCode::OK => read_json(resp).await?,
            StatusCode::NOT_FOUND => return Ok(IndexClearance::NotPresent),
            _ => return Err(status_error(resp).await),
        };

        let resp = self
            .http
            .delete(url)
            .query(&[("rev", current.rev.as_str())])
            .send()
            .await?;
        match resp.status() {
            StatusCode::OK | StatusCode::ACCEPTED => Ok(IndexClearance::Deleted { rev: current.rev }),
            _ => Err(status_error(resp).await),
        }
    }

    /// `PUT /{db}/_design/{name}`
    pub async fn install_design_index(&self, index: &DesignIndex) -> Result<RevisionId, CouchError> {
        self.put_json(&["_design", index.name.as_str()], &index.to_document())
            .await
    }

    /// `GET /{db}/_design/{name}/_view/{view}`
    pub async fn query_design_index(&self, index: &DesignIndex) -> Result<Vec<ConflictRow>, CouchError> {
        let url = self.endpoint(&["_design", index.name.as_str(), "_view", index.view.as_str()])?;
        let resp = self.http.get(url).send().await?;
        match resp.status() {
            StatusCode::OK => {
                let body: ViewResponse = read_json(resp).await?;
                debug!("View returned {} of {} rows", body.rows.len(), body.total_rows);
                Ok(body.rows.into_iter().map(ConflictRow::from).collect())
            }
            StatusCode::NOT_FOUND => Err(not_found(format!("view '{}/{}'", index.id(), index.view))),
            _ => Err(status_error(resp).await),
        }
    }

    /// Deletes every deleted-conflict revision carried by `rows`.
    ///
    /// Stops at the first failure, which names the offending document.
    pub async fn resolve_conflicts(&self, rows: &[ConflictRow]) -> Result<usize, BatchFailure> {
        let mut deleted = 0;
        for row in rows.iter().filter(|row| row.has_conflicts()) {
            info!(
                "Document {} has {} deleted conflicts",
                row.doc_id,
                row.deleted_conflicts.len()
            );
            for rev in &row.deleted_conflicts {
                self.delete_revision(&row.doc_id, rev)
                    .await
                    .map_err(|source| BatchFailure {
                        revision: Revision::new(row.doc_id.clone(), rev.clone()),
                        source,
                    })?;
                debug!("Deleted conflict revision {rev} of {}", row.doc_id);
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// `POST /{db}/_compact`; only `202 Accepted` counts as success.
    pub async fn compact(&self) -> Result<String, CouchError> {
        let resp = self
            .http
            .post(self.endpoint(&["_compact"])?)
            .header(CONTENT_TYPE, "application/json")
            .body("{}")
            .send()
            .await?;
        match resp.status() {
            StatusCode::ACCEPTED => Ok(resp.text().await?),
            _ => Err(status_error(resp).await),
        }
    }

    async fn put_json(&self, segments: &[&str], doc: &Document) -> Result<RevisionId, CouchError> {
        let body = serde_json::to_vec(doc)?;
        let resp = self
            .http
            .put(self.endpoint(segments)?)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        match resp.status() {
            StatusCode::CREATED | StatusCode::ACCEPTED => {
                let written: WriteResponse = read_json(resp).await?;
                Ok(written.rev)
            }
            _ => Err(status_error(resp).await),
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, CouchError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|_| CouchError::InvalidUrl(self.base_url.clone()))?;
        url.path_segments_mut()
            .map_err(|_| CouchError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .push(&self.db_name)
            .extend(segments);
        Ok(url)
    }
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, CouchError> {
    let bytes = resp.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

async fn status_error(resp: Response) -> CouchError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_else(|e| {
        warn!("Could not read error body: {e}");
        String::new()
    });
    CouchError::Status { status, body }
}

fn not_found(resource: String) -> CouchError {
    CouchError::NotFound { resource }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
