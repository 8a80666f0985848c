use serde::{Deserialize, Serialize};

use crate::dao::models::{PhaseSnapshotBody, PhaseSnapshotEntity};

/// Fixed key of the single phase document.
pub const PHASE_DOC_ID: &str = "phase::current";

/// Phase row as stored in CouchDB.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchPhaseDocument {
    /// Always [`PHASE_DOC_ID`].
    #[serde(rename = "_id")]
    pub id: String,
    /// Revision to update; omitted when creating the document.
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    /// Snapshot fields, inlined next to the CouchDB metadata.
    #[serde(flatten)]
    pub body: PhaseSnapshotBody,
}

impl CouchPhaseDocument {
    /// Wrap `entity` for a write against revision `rev`.
    pub fn from_entity(entity: PhaseSnapshotEntity, rev: Option<String>) -> Self {
        Self {
            id: PHASE_DOC_ID.to_owned(),
            rev,
            body: entity.into(),
        }
    }

    /// Drop the CouchDB metadata.
    pub fn into_entity(self) -> PhaseSnapshotEntity {
        self.body.into()
    }
}

/// Subset of CouchDB's write acknowledgement.
#[derive(Debug, Deserialize)]
pub struct PutResponse {
    /// Revision created by the write.
    pub rev: String,
}
