//! The ten-step revision purge.
//!
//! Steps run strictly in order and the first failure ends the run; the error
//! names the step it came from. Nothing is retried.

use std::fmt;

use revpurge_common::document::{Revision, RevisionId};
use tracing::{Instrument, error, info};

use super::client::{DocumentDeletion, IndexClearance, RevisionDeletion, RevisionPurgeClient};
use super::design::DesignIndex;
use super::error::{BatchFailure, CouchError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    FetchDocument,
    FetchRevisionHistory,
    DeleteRevisions,
    DeleteDocument,
    RecreateDocument,
    ClearIndex,
    InstallIndex,
    QueryIndex,
    ResolveConflicts,
    Compact,
}

impl Step {
    pub const ALL: [Step; 10] = [
        Step::FetchDocument,
        Step::FetchRevisionHistory,
        Step::DeleteRevisions,
        Step::DeleteDocument,
        Step::RecreateDocument,
        Step::ClearIndex,
        Step::InstallIndex,
        Step::QueryIndex,
        Step::ResolveConflicts,
        Step::Compact,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Step::FetchDocument => "fetch document",
            Step::FetchRevisionHistory => "fetch revision history",
            Step::DeleteRevisions => "delete revisions",
            Step::DeleteDocument => "delete document",
            Step::RecreateDocument => "recreate document",
            Step::ClearIndex => "clear prior index",
            Step::InstallIndex => "install index",
            Step::QueryIndex => "query index",
            Step::ResolveConflicts => "resolve conflicts",
            Step::Compact => "compact database",
        }
    }

    /// 1-based position in the workflow.
    pub fn number(&self) -> usize {
        Step::ALL.iter().position(|s| s == self).map_or(0, |i| i + 1)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The first failing step of a run and why it failed.
#[derive(Debug, thiserror::Error)]
#[error("step {} ({step}) failed{}: {source}", .step.number(), on_revision(.revision))]
pub struct WorkflowError {
    pub step: Step,
    /// Set when the failure belongs to one revision of a batch.
    pub revision: Option<Revision>,
    #[source]
    pub source: CouchError,
}

fn on_revision(revision: &Option<Revision>) -> String {
    revision
        .as_ref()
        .map(|revision| format!(" on {revision}"))
        .unwrap_or_default()
}

impl WorkflowError {
    fn at(step: Step, source: CouchError) -> Self {
        Self {
            step,
            revision: None,
            source,
        }
    }

    fn batch(step: Step, failure: BatchFailure) -> Self {
        Self {
            step,
            revision: Some(failure.revision),
            source: failure.source,
        }
    }

    /// The document a batch failure happened on.
    pub fn document_id(&self) -> Option<&str> {
        self.revision.as_ref().map(|r| r.doc_id.as_str())
    }
}

/// What a completed run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeReport {
    pub doc_id: String,
    pub revisions: RevisionDeletion,
    pub document: DocumentDeletion,
    pub recreated_rev: RevisionId,
    pub index_clearance: IndexClearance,
    pub index_rev: RevisionId,
    pub high_generation_docs: usize,
    pub conflicts_deleted: usize,
    pub compaction: String,
}

pub type PurgeOutcome = Result<PurgeReport, WorkflowError>;

impl RevisionPurgeClient {
    /// Resets `doc_id`, rebuilds the high-generation index, drops the deleted
    /// conflicts it finds and starts compaction.
    pub async fn run(&self, doc_id: &str) -> PurgeOutcome {
        self.run_steps(doc_id).instrument(self.span.clone()).await
    }

    async fn run_steps(&self, doc_id: &str) -> PurgeOutcome {
        let index = DesignIndex::high_revision_generation();

        announce(Step::FetchDocument);
        let doc = self
            .fetch_document(doc_id)
            .await
            .map_err(|e| fail(WorkflowError::at(Step::FetchDocument, e)))?;

        announce(Step::FetchRevisionHistory);
        let history = self
            .fetch_revision_history(doc_id)
            .await
            .map_err(|e| fail(WorkflowError::at(Step::FetchRevisionHistory, e)))?;
        info!("{doc_id} has {} recorded revisions", history.len());

        announce(Step::DeleteRevisions);
        let revisions = self
            .delete_revisions(doc_id, &history)
            .await
            .map_err(|e| fail(WorkflowError::batch(Step::DeleteRevisions, e)))?;
        info!(
            "Deleted {} revisions, {} already gone",
            revisions.deleted, revisions.already_gone
        );

        announce(Step::DeleteDocument);
        let document = self
            .delete_document(doc_id)
            .await
            .map_err(|e| fail(WorkflowError::at(Step::DeleteDocument, e)))?;

        announce(Step::RecreateDocument);
        let recreated_rev = self
            .recreate_document(doc)
            .await
            .map_err(|e| fail(WorkflowError::at(Step::RecreateDocument, e)))?;
        info!("Recreated {doc_id} at {recreated_rev}");

        announce(Step::ClearIndex);
        let index_clearance = self
            .clear_design_index(&index)
            .await
            .map_err(|e| fail(WorkflowError::at(Step::ClearIndex, e)))?;
        info!("{index_clearance}");

        announce(Step::InstallIndex);
        let index_rev = self
            .install_design_index(&index)
            .await
            .map_err(|e| fail(WorkflowError::at(Step::InstallIndex, e)))?;
        info!("Design document {} created at {index_rev}", index.id());

        announce(Step::QueryIndex);
        let rows = self
            .query_design_index(&index)
            .await
            .map_err(|e| fail(WorkflowError::at(Step::QueryIndex, e)))?;
        info!("{} documents above the generation threshold", rows.len());

        announce(Step::ResolveConflicts);
        let conflicts_deleted = self
            .resolve_conflicts(&rows)
            .await
            .map_err(|e| fail(WorkflowError::batch(Step::ResolveConflicts, e)))?;

        announce(Step::Compact);
        let compaction = self
            .compact()
            .await
            .map_err(|e| fail(WorkflowError::at(Step::Compact, e)))?;
        info!("Database compaction triggered: {}", compaction.trim());

        Ok(PurgeReport {
            doc_id: doc_id.to_string(),
            revisions,
            document,
            recreated_rev,
            index_clearance,
            index_rev,
            high_generation_docs: rows.len(),
            conflicts_deleted,
            compaction,
        })
    }
}

fn announce(step: Step) {
    info!("[{}/{}] {step}", step.number(), Step::ALL.len());
}

fn fail(err: WorkflowError) -> WorkflowError {
    error!("{err}");
    err
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
