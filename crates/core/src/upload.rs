//! Upload session identifiers and the upload specification.

use crate::part::Part;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for the logical object being uploaded.
///
/// Opaque to the protocol; typically a UUID assigned by an external registry.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ObjectId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier the backend assigns to one multipart session.
///
/// Opaque and backend-issued. At most one upload id is logically active per
/// object at any time; a new initiate supersedes any prior session.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadId(String);

impl UploadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Session identity comparison for resume decisions.
    ///
    /// Backends are inconsistent about upload-id casing across calls, so the
    /// resume protocol compares case-insensitively.
    pub fn matches(&self, other: &UploadId) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl From<&str> for UploadId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Debug for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UploadId({})", self.0)
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The full plan for one upload attempt.
///
/// Created once per initiate by the coordinator and immutable afterwards,
/// except for per-part completion fields which are mutated only through the
/// state store. On successful finalize this structure (with final etags) is
/// serialized as the `.meta` companion object.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadSpecification {
    /// Backend key of the object blob.
    pub object_key: String,
    /// Logical object identifier.
    pub object_id: ObjectId,
    /// Backend-issued session identifier.
    pub upload_id: UploadId,
    /// Ordered parts partitioning `[0, file_size)`.
    pub parts: Vec<Part>,
}

impl UploadSpecification {
    pub fn new(
        object_key: impl Into<String>,
        object_id: ObjectId,
        upload_id: UploadId,
        parts: Vec<Part>,
    ) -> Self {
        Self {
            object_key: object_key.into(),
            object_id,
            upload_id,
            parts,
        }
    }

    /// Sum of all part sizes; equals the planned file size.
    pub fn total_size(&self) -> u64 {
        self.parts.iter().map(|p| p.size).sum()
    }
}
