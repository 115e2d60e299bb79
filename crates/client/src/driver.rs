//! The upload driver's retry state machine.

use crate::api::StorageApi;
use crate::progress::{LogProgressListener, Progress, ProgressListener};
use crate::session::SessionStore;
use crate::transport::{TransportBuilder, TransportJob};
use barge_core::{ClientConfig, ObjectId, Part, Result, UploadError, UploadProgress};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Drives one file's upload to completion across failures and restarts.
///
/// Each attempt runs three phases. Deciding reconciles the local session
/// record with the service's view and either resumes or opens a fresh
/// session; conflicting views fail `NotResumable`. Uploading hands the
/// pending parts to the transport and finalizes when all are done.
/// Recovering runs after a failed attempt and decides whether the next
/// attempt resumes or starts over.
pub struct UploadDriver {
    api: Arc<dyn StorageApi>,
    transport: Arc<dyn TransportBuilder>,
    sessions: SessionStore,
    config: ClientConfig,
    listener: Arc<dyn ProgressListener>,
}

impl UploadDriver {
    pub fn new(
        api: Arc<dyn StorageApi>,
        transport: Arc<dyn TransportBuilder>,
        sessions: SessionStore,
        config: ClientConfig,
    ) -> Self {
        let listener = Arc::new(LogProgressListener::new(config.quiet));
        Self {
            api,
            transport,
            sessions,
            config,
            listener,
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Upload `file` as `object_id`, resuming a prior session when one
    /// survives. `redo` discards any prior session and overwrites an
    /// existing object.
    ///
    /// Attempts are bounded by the configured retry count; `NotResumable`
    /// and `Internal` errors end the upload immediately.
    #[instrument(skip(self, md5), fields(object_id = %object_id))]
    pub async fn upload(
        &self,
        file: &Path,
        object_id: &ObjectId,
        md5: Option<&str>,
        redo: bool,
    ) -> Result<()> {
        let file_size = tokio::fs::metadata(file)
            .await
            .map_err(UploadError::retryable)?
            .len();

        let max_attempts = self.config.max_attempts();
        let mut force_initiate = redo;
        let mut first_attempt = true;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let outcome = self
                .run_attempt(file, object_id, file_size, md5, redo, force_initiate, first_attempt)
                .await;
            match outcome {
                Ok(()) => return Ok(()),
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(attempt, error = %err, "upload attempt failed");
                    if attempt >= max_attempts {
                        return Err(err);
                    }
                    force_initiate = !self.probe_recoverable(object_id, file_size).await?;
                    first_attempt = false;
                }
            }
        }
    }

    /// The Recovering phase: ask the service whether anything worth
    /// resuming survives. A transient probe failure counts as "start over"
    /// rather than burning the remaining attempts on the probe itself.
    async fn probe_recoverable(&self, object_id: &ObjectId, file_size: u64) -> Result<bool> {
        match self.api.is_recoverable(object_id, file_size).await {
            Ok(recoverable) => {
                debug!(recoverable, "recovery probe");
                Ok(recoverable)
            }
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                warn!(error = %err, "recovery probe failed; next attempt starts fresh");
                Ok(false)
            }
        }
    }

    async fn run_attempt(
        &self,
        file: &Path,
        object_id: &ObjectId,
        file_size: u64,
        md5: Option<&str>,
        overwrite: bool,
        force_initiate: bool,
        first_attempt: bool,
    ) -> Result<()> {
        let view = self
            .decide(object_id, file_size, md5, overwrite, force_initiate)
            .await?;
        let upload_id = view.upload_id.clone();

        let parts = pending_parts(&view.parts, first_attempt);
        let progress = Progress::new(
            view.total_parts(),
            view.completed_count(),
            self.listener.clone(),
        );

        if !parts.is_empty() {
            let job = TransportJob {
                object_id: object_id.clone(),
                upload_id: upload_id.clone(),
                parts,
                file: file.to_path_buf(),
            };
            let transport = self.transport.build(job);
            transport.transfer(self.api.as_ref(), &progress).await?;
        }

        self.api.finalize_upload(object_id, &upload_id).await?;
        progress.finish();
        self.sessions
            .close(object_id)
            .map_err(|e| UploadError::internal(format!("session store: {e}")))?;
        Ok(())
    }

    /// The Deciding phase: reconcile local and remote session records.
    async fn decide(
        &self,
        object_id: &ObjectId,
        file_size: u64,
        md5: Option<&str>,
        overwrite: bool,
        force_initiate: bool,
    ) -> Result<UploadProgress> {
        if force_initiate {
            return self.initiate(object_id, file_size, md5, overwrite).await;
        }

        let local = self
            .sessions
            .fetch_upload_id(object_id)
            .map_err(|e| UploadError::internal(format!("session store: {e}")))?;
        let remote = match self.api.get_progress(object_id).await {
            Ok(progress) => Some(progress),
            Err(UploadError::IdNotFound(_)) => None,
            Err(err) => return Err(err),
        };

        match (local, remote) {
            // No remote session: whatever the local record says, start over.
            (_, None) => self.initiate(object_id, file_size, md5, overwrite).await,
            (Some(local_id), Some(remote)) if local_id.matches(&remote.upload_id) => {
                info!(
                    upload_id = %remote.upload_id,
                    completed = remote.completed_count(),
                    total = remote.total_parts(),
                    "resuming upload session"
                );
                Ok(remote)
            }
            (Some(_), Some(remote)) => Err(UploadError::not_resumable(format!(
                "local record for object {object_id} names a different session than the \
                 service's active session {}",
                remote.upload_id
            ))),
            (None, Some(remote)) => Err(UploadError::not_resumable(format!(
                "object {object_id} has active session {} started by another client",
                remote.upload_id
            ))),
        }
    }

    async fn initiate(
        &self,
        object_id: &ObjectId,
        file_size: u64,
        md5: Option<&str>,
        overwrite: bool,
    ) -> Result<UploadProgress> {
        let spec = match self
            .api
            .initiate_upload(object_id, file_size, overwrite, md5)
            .await
        {
            Ok(spec) => spec,
            // The service refuses to open a session for this object at all;
            // there is nothing to retry and nothing to resume.
            Err(UploadError::NotRetryable(msg)) => {
                return Err(UploadError::not_resumable(msg))
            }
            Err(err) => return Err(err),
        };
        info!(upload_id = %spec.upload_id, parts = spec.parts.len(), "opened upload session");
        self.sessions
            .save(&spec)
            .map_err(|e| UploadError::internal(format!("session store: {e}")))?;
        Ok(UploadProgress::new(
            object_id.clone(),
            spec.upload_id,
            spec.parts,
            Vec::new(),
        ))
    }
}

/// The parts a transport should be handed. On a process's first attempt
/// completed parts stay in for local checksum re-validation; later attempts
/// within the process trust the completions they made themselves.
fn pending_parts(parts: &[Part], include_completed: bool) -> Vec<Part> {
    parts
        .iter()
        .filter(|p| include_completed || !p.is_completed())
        .cloned()
        .collect()
}
