//! Read-only projection of upload progress.

use crate::part::{CompletedPart, Part};
use crate::upload::{ObjectId, UploadId};
use serde::{Deserialize, Serialize};

/// Snapshot of total versus completed parts for one session.
///
/// Computed on demand from stored state; never itself a source of truth.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadProgress {
    pub object_id: ObjectId,
    pub upload_id: UploadId,
    /// The full part list, with completion fields populated where recorded.
    pub parts: Vec<Part>,
    /// Parts with verified completions.
    pub completed_parts: Vec<CompletedPart>,
}

impl UploadProgress {
    pub fn new(
        object_id: ObjectId,
        upload_id: UploadId,
        parts: Vec<Part>,
        completed_parts: Vec<CompletedPart>,
    ) -> Self {
        Self {
            object_id,
            upload_id,
            parts,
            completed_parts,
        }
    }

    pub fn total_parts(&self) -> usize {
        self.parts.len()
    }

    pub fn completed_count(&self) -> usize {
        self.completed_parts.len()
    }

    pub fn is_completed(&self) -> bool {
        self.completed_count() == self.total_parts()
    }
}
