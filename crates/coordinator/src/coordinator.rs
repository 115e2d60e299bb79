//! The upload coordinator service.

use barge_core::{
    keys, plan_parts, CompletedPart, CoordinatorConfig, ObjectId, Result, UploadError, UploadId,
    UploadProgress, UploadSpecification,
};
use barge_state::{StateError, UploadStateStore};
use barge_storage::{normalize_etag, ObjectMeta, ObjectStore, StorageError};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Coordinates multipart upload sessions between clients, the durable state
/// store, and the storage backend.
///
/// The coordinator never trusts a client-reported completion: every
/// `finalize_upload_part` is verified against the backend's part listing
/// before it is recorded, and `recover` re-runs that verification for every
/// recorded part.
pub struct UploadCoordinator {
    store: Arc<dyn ObjectStore>,
    state: Arc<dyn UploadStateStore>,
    config: CoordinatorConfig,
}

impl UploadCoordinator {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        state: Arc<dyn UploadStateStore>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            store,
            state,
            config,
        }
    }

    fn object_key(&self, object_id: &ObjectId) -> String {
        keys::object_key(&self.config.data_dir, object_id)
    }

    fn meta_key(&self, object_id: &ObjectId) -> String {
        keys::object_meta_key(&self.config.data_dir, object_id)
    }

    fn url_expiry(&self) -> Duration {
        Duration::from_secs(u64::from(self.config.url_expiry_days) * SECONDS_PER_DAY)
    }

    /// Open a new upload session for `object_id`, superseding any prior one.
    ///
    /// The returned specification carries one presigned PUT URL per planned
    /// part. Last writer wins: any existing session for the object is purged
    /// locally and its remote multipart session aborted best-effort.
    #[instrument(skip(self, md5), fields(object_id = %object_id, file_size))]
    pub async fn initiate_upload(
        &self,
        object_id: &ObjectId,
        file_size: u64,
        overwrite: bool,
        md5: Option<&str>,
    ) -> Result<UploadSpecification> {
        if !overwrite && self.object_exists(object_id).await? {
            return Err(UploadError::not_retryable(format!(
                "object {object_id} already exists and overwrite is not set"
            )));
        }

        self.purge_prior_session(object_id).await?;

        let key = self.object_key(object_id);
        let upload_id = self.store.initiate_multipart(&key).await?;
        let mut parts = plan_parts(&self.config.policy, file_size)?;
        for part in &mut parts {
            let url = self
                .store
                .presign_part(&key, &upload_id, part.part_number, self.url_expiry())
                .await?;
            part.url = Some(url);
        }

        let spec = UploadSpecification::new(key, object_id.clone(), upload_id, parts);
        self.state.create(&spec, md5).await?;

        info!(
            upload_id = %spec.upload_id,
            parts = spec.parts.len(),
            "upload session initiated"
        );
        Ok(spec)
    }

    /// Drop any existing session for the object: delete its state and abort
    /// the remote multipart session. The abort is best-effort; the session
    /// may already be gone on the backend.
    async fn purge_prior_session(&self, object_id: &ObjectId) -> Result<()> {
        let prior = match self.state.get_upload_id(object_id).await {
            Ok(upload_id) => upload_id,
            Err(StateError::IdNotFound { .. }) => return Ok(()),
            Err(err) => return Err(err.into()),
        };

        info!(prior_upload_id = %prior, "superseding prior upload session");
        let key = self.object_key(object_id);
        if let Err(err) = self.store.abort_multipart(&key, &prior).await {
            warn!(prior_upload_id = %prior, error = %err, "abort of prior session failed");
        }
        match self.state.delete(object_id, &prior).await {
            Ok(()) | Err(StateError::IdNotFound { .. }) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Record a part completion after verifying it against the backend.
    #[instrument(skip(self, md5, etag), fields(object_id = %object_id, part_number))]
    pub async fn finalize_upload_part(
        &self,
        object_id: &ObjectId,
        upload_id: &UploadId,
        part_number: u32,
        md5: &str,
        etag: &str,
    ) -> Result<()> {
        if md5.is_empty() || etag.is_empty() {
            return Err(UploadError::not_retryable(format!(
                "invalid md5/etag for part {part_number} of object {object_id}"
            )));
        }

        if !self.part_exists(object_id, upload_id, part_number, etag).await? {
            return Err(UploadError::not_retryable(format!(
                "part {part_number} of object {object_id} does not exist on the backend"
            )));
        }

        self.state
            .finalize_upload_part(object_id, upload_id, part_number, md5, etag)
            .await?;
        debug!("part completion recorded");
        Ok(())
    }

    /// Check the backend's part listing for `part_number` with the expected
    /// etag. Listing starts at the part just before the one of interest, so
    /// a single entry suffices.
    async fn part_exists(
        &self,
        object_id: &ObjectId,
        upload_id: &UploadId,
        part_number: u32,
        etag: &str,
    ) -> Result<bool> {
        let key = self.object_key(object_id);
        let listed = self
            .store
            .list_parts(&key, upload_id, part_number.saturating_sub(1), 1)
            .await?;
        Ok(listed.iter().any(|summary| {
            summary.part_number == part_number
                && normalize_etag(&summary.etag) == normalize_etag(etag)
        }))
    }

    /// Complete the multipart session and publish the `.meta` companion.
    ///
    /// Requires every part to have a recorded completion. On success the
    /// session's state is deleted; the `.meta` object holds the serialized
    /// specification with final etags.
    #[instrument(skip(self), fields(object_id = %object_id))]
    pub async fn finalize_upload(&self, object_id: &ObjectId, upload_id: &UploadId) -> Result<()> {
        if !self.state.is_completed(object_id, upload_id).await? {
            return Err(UploadError::not_retryable(format!(
                "upload for object {object_id} has incomplete parts"
            )));
        }

        let key = self.object_key(object_id);
        let completed = self.state.retrieve_completed_parts(object_id, upload_id).await?;
        self.store
            .complete_multipart(&key, upload_id, &completed)
            .await?;

        let spec = self.state.load_specification(object_id, upload_id).await?;
        let meta = serde_json::to_vec(&spec)
            .map_err(|e| UploadError::internal(format!("cannot serialize specification: {e}")))?;
        self.store
            .put_object(&self.meta_key(object_id), Bytes::from(meta))
            .await?;

        self.state.delete(object_id, upload_id).await?;
        info!(upload_id = %upload_id, "upload finalized");
        Ok(())
    }

    /// Abort a session and discard its state.
    ///
    /// Not safe to run concurrently with `finalize_upload` for the same
    /// session; callers serialize the two per upload id.
    #[instrument(skip(self), fields(object_id = %object_id))]
    pub async fn cancel_upload(&self, object_id: &ObjectId, upload_id: &UploadId) -> Result<()> {
        let key = self.object_key(object_id);
        self.store.abort_multipart(&key, upload_id).await?;
        self.state.delete(object_id, upload_id).await?;
        info!(upload_id = %upload_id, "upload cancelled");
        Ok(())
    }

    /// Abort every outstanding multipart session in the bucket, clearing
    /// matching local state. Sessions under foreign keys are aborted too but
    /// have no state to clear.
    #[instrument(skip(self))]
    pub async fn cancel_all_uploads(&self) -> Result<()> {
        let sessions = self.store.list_multipart_uploads().await?;
        info!(sessions = sessions.len(), "cancelling outstanding upload sessions");
        for session in sessions {
            self.store
                .abort_multipart(&session.key, &session.upload_id)
                .await?;
            if let Some(object_id) = keys::object_id_from_key(&self.config.data_dir, &session.key)
            {
                match self.state.delete(&object_id, &session.upload_id).await {
                    Ok(()) | Err(StateError::IdNotFound { .. }) => {}
                    Err(err) => return Err(err.into()),
                }
            }
        }
        Ok(())
    }

    /// Re-verify every recorded part completion against the backend,
    /// demoting completions the backend no longer vouches for. Idempotent.
    #[instrument(skip(self), fields(object_id = %object_id))]
    pub async fn recover(&self, object_id: &ObjectId) -> Result<()> {
        let upload_id = self.state.get_upload_id(object_id).await?;
        let spec = self.state.load_specification(object_id, &upload_id).await?;

        for part in spec.parts.iter().filter(|p| p.is_completed()) {
            // is_completed() guarantees the etag is present.
            let etag = part.etag.as_deref().unwrap_or_default();
            if !self
                .part_exists(object_id, &upload_id, part.part_number, etag)
                .await?
            {
                warn!(
                    part_number = part.part_number,
                    "recorded part no longer verifiable; demoting"
                );
                self.state
                    .delete_part(object_id, &upload_id, part.part_number)
                    .await?;
            }
        }
        Ok(())
    }

    /// Whether a resumable session for `object_id` survives recovery: the
    /// planned total must match `file_size` and at least one verified part
    /// completion must remain.
    #[instrument(skip(self), fields(object_id = %object_id, file_size))]
    pub async fn is_recoverable(&self, object_id: &ObjectId, file_size: u64) -> Result<bool> {
        match self.recover(object_id).await {
            Ok(()) => {}
            Err(UploadError::IdNotFound(_)) => return Ok(false),
            Err(err) => return Err(err),
        }

        let upload_id = self.state.get_upload_id(object_id).await?;
        let spec = self.state.load_specification(object_id, &upload_id).await?;
        let recoverable =
            spec.total_size() == file_size && spec.parts.iter().any(|p| p.is_completed());
        debug!(recoverable, "recoverability decided");
        Ok(recoverable)
    }

    /// The active session's progress, located by object id alone. This is
    /// how a resuming client learns which upload id the service considers
    /// current.
    pub async fn get_object_progress(&self, object_id: &ObjectId) -> Result<UploadProgress> {
        let upload_id = self.state.get_upload_id(object_id).await?;
        self.get_upload_progress(object_id, &upload_id).await
    }

    /// Snapshot of the session's completion state.
    pub async fn get_upload_progress(
        &self,
        object_id: &ObjectId,
        upload_id: &UploadId,
    ) -> Result<UploadProgress> {
        let spec = self.state.load_specification(object_id, upload_id).await?;
        let completed: Vec<CompletedPart> = self
            .state
            .retrieve_completed_parts(object_id, upload_id)
            .await?;
        Ok(UploadProgress::new(
            object_id.clone(),
            spec.upload_id,
            spec.parts,
            completed,
        ))
    }

    /// Whether the final object blob exists on the backend.
    pub async fn object_exists(&self, object_id: &ObjectId) -> Result<bool> {
        match self.store.object_metadata(&self.object_key(object_id)).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Metadata of the final object blob.
    pub async fn object_metadata(&self, object_id: &ObjectId) -> Result<ObjectMeta> {
        match self.store.object_metadata(&self.object_key(object_id)).await {
            Ok(meta) => Ok(meta),
            Err(StorageError::NotFound(_)) => {
                Err(UploadError::IdNotFound(object_id.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }
}
