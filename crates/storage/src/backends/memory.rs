//! In-process backend for tests and local development.
//!
//! Mirrors the S3 multipart contract closely enough to exercise the whole
//! upload protocol: sessions hold parts keyed by part number, etags are the
//! quoted hex md5 of the part body (matching single-part S3 semantics), and
//! presigned URLs are fabricated `memory://` URIs carrying the same query
//! parameters a real signed part-PUT would.

use crate::error::{StorageError, StorageResult};
use crate::traits::{
    normalize_etag, MultipartUploadSummary, ObjectMeta, ObjectStore, PartSummary,
};
use async_trait::async_trait;
use barge_core::{CompletedPart, UploadId};
use bytes::Bytes;
use md5::{Digest, Md5};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;
use tracing::instrument;

#[derive(Debug)]
struct StoredObject {
    data: Bytes,
    last_modified: time::OffsetDateTime,
}

#[derive(Debug, Default)]
struct MultipartSession {
    key: String,
    /// Stored parts by part number: (etag, body).
    parts: BTreeMap<u32, (String, Bytes)>,
}

/// HashMap-backed object store.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    bucket: String,
    objects: Mutex<HashMap<String, StoredObject>>,
    sessions: Mutex<HashMap<String, MultipartSession>>,
}

impl MemoryBackend {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            objects: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Quoted hex md5, the etag shape S3 uses for single-part uploads.
    pub fn etag_of(data: &[u8]) -> String {
        format!("\"{}\"", hex::encode(Md5::digest(data)))
    }

    /// Store one part's bytes, as the transport's presigned PUT would.
    ///
    /// Returns the backend etag. Test transports call this in place of an
    /// HTTP PUT against the part's `memory://` URL.
    pub fn put_part(
        &self,
        key: &str,
        upload_id: &UploadId,
        part_number: u32,
        body: Bytes,
    ) -> StorageResult<String> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get_mut(upload_id.as_str())
            .filter(|s| s.key == key)
            .ok_or_else(|| StorageError::NoSuchUpload(upload_id.to_string()))?;
        let etag = Self::etag_of(&body);
        session.parts.insert(part_number, (etag.clone(), body));
        Ok(etag)
    }

    /// Fetch a stored object's bytes, if present.
    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().get(key).map(|o| o.data.clone())
    }

    /// Drop one part from a session, simulating backend-side loss for
    /// reconciliation tests.
    pub fn drop_part(&self, upload_id: &UploadId, part_number: u32) {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(session) = sessions.get_mut(upload_id.as_str()) {
            session.parts.remove(&part_number);
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryBackend {
    #[instrument(skip(self), fields(backend = "memory"))]
    async fn initiate_multipart(&self, key: &str) -> StorageResult<UploadId> {
        let upload_id = uuid::Uuid::new_v4().to_string();
        let mut sessions = self.sessions.lock().unwrap();
        sessions.insert(
            upload_id.clone(),
            MultipartSession {
                key: key.to_string(),
                parts: BTreeMap::new(),
            },
        );
        Ok(UploadId::new(upload_id))
    }

    async fn presign_part(
        &self,
        key: &str,
        upload_id: &UploadId,
        part_number: u32,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let sessions = self.sessions.lock().unwrap();
        if !sessions.contains_key(upload_id.as_str()) {
            return Err(StorageError::NoSuchUpload(upload_id.to_string()));
        }
        Ok(format!(
            "memory://{}/{}?partNumber={}&uploadId={}&expires={}",
            self.bucket,
            key,
            part_number,
            upload_id,
            expires_in.as_secs()
        ))
    }

    async fn list_parts(
        &self,
        key: &str,
        upload_id: &UploadId,
        part_number_marker: u32,
        max_parts: u32,
    ) -> StorageResult<Vec<PartSummary>> {
        let sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get(upload_id.as_str())
            .filter(|s| s.key == key)
            .ok_or_else(|| StorageError::NoSuchUpload(upload_id.to_string()))?;
        Ok(session
            .parts
            .range(part_number_marker + 1..)
            .take(max_parts as usize)
            .map(|(number, (etag, _))| PartSummary {
                part_number: *number,
                etag: etag.clone(),
            })
            .collect())
    }

    #[instrument(skip(self, parts), fields(backend = "memory", parts = parts.len()))]
    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &UploadId,
        parts: &[CompletedPart],
    ) -> StorageResult<()> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get(upload_id.as_str())
            .filter(|s| s.key == key)
            .ok_or_else(|| StorageError::NoSuchUpload(upload_id.to_string()))?;

        let mut assembled = Vec::new();
        for completed in parts {
            let (etag, body) = session.parts.get(&completed.part_number).ok_or_else(|| {
                StorageError::InvalidKey(format!(
                    "complete references missing part {}",
                    completed.part_number
                ))
            })?;
            if normalize_etag(etag) != normalize_etag(&completed.etag) {
                return Err(StorageError::InvalidKey(format!(
                    "etag mismatch for part {}",
                    completed.part_number
                )));
            }
            assembled.extend_from_slice(body);
        }

        sessions.remove(upload_id.as_str());
        drop(sessions);

        let mut objects = self.objects.lock().unwrap();
        objects.insert(
            key.to_string(),
            StoredObject {
                data: Bytes::from(assembled),
                last_modified: time::OffsetDateTime::now_utc(),
            },
        );
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn abort_multipart(&self, key: &str, upload_id: &UploadId) -> StorageResult<()> {
        let mut sessions = self.sessions.lock().unwrap();
        let removed = sessions
            .remove(upload_id.as_str())
            .filter(|s| s.key == key);
        if removed.is_none() {
            return Err(StorageError::NoSuchUpload(upload_id.to_string()));
        }
        Ok(())
    }

    async fn list_multipart_uploads(&self) -> StorageResult<Vec<MultipartUploadSummary>> {
        let sessions = self.sessions.lock().unwrap();
        let mut uploads: Vec<_> = sessions
            .iter()
            .map(|(id, session)| MultipartUploadSummary {
                key: session.key.clone(),
                upload_id: UploadId::from(id.as_str()),
            })
            .collect();
        uploads.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(uploads)
    }

    async fn put_object(&self, key: &str, data: Bytes) -> StorageResult<()> {
        let mut objects = self.objects.lock().unwrap();
        objects.insert(
            key.to_string(),
            StoredObject {
                data,
                last_modified: time::OffsetDateTime::now_utc(),
            },
        );
        Ok(())
    }

    async fn object_metadata(&self, key: &str) -> StorageResult<ObjectMeta> {
        let objects = self.objects.lock().unwrap();
        let object = objects
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(ObjectMeta {
            size: object.data.len() as u64,
            last_modified: Some(object.last_modified),
        })
    }

    async fn bucket_exists(&self) -> StorageResult<bool> {
        Ok(true)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
