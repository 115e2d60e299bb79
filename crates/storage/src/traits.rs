//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use barge_core::{CompletedPart, UploadId};
use bytes::Bytes;
use std::time::Duration;

/// Metadata about a stored object.
#[derive(Clone, Debug)]
pub struct ObjectMeta {
    /// Object size in bytes.
    pub size: u64,
    /// Last modification time (if the backend reports one).
    pub last_modified: Option<time::OffsetDateTime>,
}

/// One stored part as reported by the backend's part listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartSummary {
    pub part_number: u32,
    pub etag: String,
}

/// One outstanding multipart session as reported by the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultipartUploadSummary {
    pub key: String,
    pub upload_id: UploadId,
}

/// Object store abstraction consumed by the upload coordinator.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Open a new multipart session for `key`.
    async fn initiate_multipart(&self, key: &str) -> StorageResult<UploadId>;

    /// Issue a time-limited PUT authorization for one part of a session.
    ///
    /// Backends may clamp `expires_in` to their own signing limits.
    async fn presign_part(
        &self,
        key: &str,
        upload_id: &UploadId,
        part_number: u32,
        expires_in: Duration,
    ) -> StorageResult<String>;

    /// List stored parts of a session, starting after `part_number_marker`,
    /// at most `max_parts` entries, ordered by part number.
    async fn list_parts(
        &self,
        key: &str,
        upload_id: &UploadId,
        part_number_marker: u32,
        max_parts: u32,
    ) -> StorageResult<Vec<PartSummary>>;

    /// Stitch the uploaded parts into the final object and close the session.
    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &UploadId,
        parts: &[CompletedPart],
    ) -> StorageResult<()>;

    /// Abort a session, discarding any stored parts.
    async fn abort_multipart(&self, key: &str, upload_id: &UploadId) -> StorageResult<()>;

    /// List every outstanding multipart session in the bucket.
    async fn list_multipart_uploads(&self) -> StorageResult<Vec<MultipartUploadSummary>>;

    /// Put a whole object atomically.
    async fn put_object(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Stat an object without fetching content.
    async fn object_metadata(&self, key: &str) -> StorageResult<ObjectMeta>;

    /// Verify the bucket is reachable. Health-check boundary only.
    async fn bucket_exists(&self) -> StorageResult<bool>;

    /// Static identifier for the backend type, used in logs.
    fn backend_name(&self) -> &'static str;
}

/// Strip surrounding quotes from a backend entity tag.
///
/// S3 returns etags quoted; clients sometimes report them bare. Completion
/// verification compares the normalized forms.
pub fn normalize_etag(etag: &str) -> &str {
    etag.trim_matches('"')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_etag() {
        assert_eq!(normalize_etag("\"abc123\""), "abc123");
        assert_eq!(normalize_etag("abc123"), "abc123");
    }
}
