//! CouchDB side of the tool: the HTTP operations and the revision purge workflow
//! built on top of them.

mod client;
mod design;
mod error;
mod workflow;

pub use client::{DocumentDeletion, IndexClearance, RevisionDeletion, RevisionPurgeClient};
pub use design::{ConflictRow, DESIGN_NAME, DesignIndex, VIEW_NAME};
pub use error::{BatchFailure, CouchError};
pub use workflow::{PurgeOutcome, PurgeReport, Step, WorkflowError};
