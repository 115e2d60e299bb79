//! The driver's view of an upload coordinator.

use async_trait::async_trait;
use barge_core::{ObjectId, Result, UploadId, UploadProgress, UploadSpecification};

/// Coordinator operations the upload driver depends on.
///
/// An in-process implementation wraps the coordinator directly; a remote
/// implementation would speak whatever wire protocol the deployment uses.
/// Either way the error taxonomy is the protocol: the driver's retry loop
/// reacts only to the [`barge_core::UploadError`] classification.
#[async_trait]
pub trait StorageApi: Send + Sync {
    /// Open a fresh upload session for the object.
    async fn initiate_upload(
        &self,
        object_id: &ObjectId,
        file_size: u64,
        overwrite: bool,
        md5: Option<&str>,
    ) -> Result<UploadSpecification>;

    /// Progress of the object's active session. `IdNotFound` means the
    /// service has no session for this object.
    async fn get_progress(&self, object_id: &ObjectId) -> Result<UploadProgress>;

    /// Report one transferred part for verification and recording.
    async fn finalize_upload_part(
        &self,
        object_id: &ObjectId,
        upload_id: &UploadId,
        part_number: u32,
        md5: &str,
        etag: &str,
    ) -> Result<()>;

    /// Ask the coordinator to stitch the completed session.
    async fn finalize_upload(&self, object_id: &ObjectId, upload_id: &UploadId) -> Result<()>;

    /// Whether a session worth resuming survives server-side recovery for a
    /// local file of `file_size` bytes.
    async fn is_recoverable(&self, object_id: &ObjectId, file_size: u64) -> Result<bool>;

    /// Whether the finalized object blob already exists.
    async fn object_exists(&self, object_id: &ObjectId) -> Result<bool>;
}
