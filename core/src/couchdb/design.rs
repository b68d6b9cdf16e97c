use revpurge_common::document::{Document, HIGH_GENERATION_THRESHOLD, RevisionId};
use serde::Deserialize;
use serde_json::{Value, json};

pub const DESIGN_NAME: &str = "rev_filter";
pub const VIEW_NAME: &str = "high_rev_gen";

/// A design document holding a single JavaScript map view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesignIndex {
    pub name: String,
    pub view: String,
    pub map: String,
}

impl DesignIndex {
    /// Selects documents whose current revision generation is strictly above
    /// [`HIGH_GENERATION_THRESHOLD`], carrying their deleted conflicts in the value.
    pub fn high_revision_generation() -> Self {
        let map = format!(
            "function(doc) {{ \
               var gen = parseInt(doc._rev.split(\"-\")[0], 10); \
               if (gen > {HIGH_GENERATION_THRESHOLD}) {{ \
                 emit(doc._id, {{ _id: doc._id, _rev: doc._rev, generation: gen, \
                   _deleted_conflicts: doc._deleted_conflicts || [] }}); \
               }} \
             }}"
        );
        Self {
            name: DESIGN_NAME.to_string(),
            view: VIEW_NAME.to_string(),
            map,
        }
    }

    pub fn id(&self) -> String {
        format!("_design/{}", self.name)
    }

    pub fn to_document(&self) -> Document {
        let body = json!({
            "_id": self.id(),
            "language": "javascript",
            "views": {
                self.view.as_str(): { "map": self.map }
            }
        });
        match body {
            Value::Object(map) => map,
            _ => Document::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ViewResponse {
    #[serde(default)]
    pub total_rows: u64,
    #[serde(default)]
    pub rows: Vec<ViewRow>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ViewRow {
    pub id: String,
    #[serde(default)]
    pub key: Value,
    #[serde(default)]
    pub value: Value,
}

/// A document selected by the view, with any deleted-conflict revisions it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictRow {
    pub doc_id: String,
    pub key: Value,
    pub current_rev: Option<RevisionId>,
    pub deleted_conflicts: Vec<RevisionId>,
}

impl ConflictRow {
    pub fn has_conflicts(&self) -> bool {
        !self.deleted_conflicts.is_empty()
    }
}

impl From<ViewRow> for ConflictRow {
    fn from(row: ViewRow) -> Self {
        let current_rev = row
            .value
            .get("_rev")
            .and_then(Value::as_str)
            .map(RevisionId::from);

        let deleted_conflicts = row
            .value
            .get("_deleted_conflicts")
            .and_then(Value::as_array)
            .map(|revs| {
                revs.iter()
                    .filter_map(Value::as_str)
                    .map(RevisionId::from)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            doc_id: row.id,
            key: row.key,
            current_rev,
            deleted_conflicts,
        }
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
