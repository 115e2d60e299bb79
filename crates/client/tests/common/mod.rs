#![allow(dead_code)]

use async_trait::async_trait;
use barge_client::{
    file_part_md5, Progress, SessionStore, StorageApi, Transport, TransportBuilder, TransportJob,
    UploadDriver,
};
use barge_coordinator::UploadCoordinator;
use barge_core::{
    ClientConfig, CoordinatorConfig, ObjectId, Part, PartPolicy, Result, UploadError, UploadId,
    UploadProgress, UploadSpecification,
};
use barge_state::SqliteStateStore;
use barge_storage::MemoryBackend;
use bytes::Bytes;
use md5::{Digest, Md5};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Part size of the default test policy.
pub const PART_SIZE: u64 = 1024;

pub fn small_policy() -> PartPolicy {
    PartPolicy {
        part_size: PART_SIZE,
        min_part_size: PART_SIZE,
        ..PartPolicy::default()
    }
}

/// Deterministic pseudo-random content.
pub fn test_bytes(len: usize) -> Bytes {
    let mut data = Vec::with_capacity(len);
    let mut x: u32 = 0x2545_f491;
    for _ in 0..len {
        x = x.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        data.push((x >> 24) as u8);
    }
    Bytes::from(data)
}

/// [`StorageApi`] implemented directly over an in-process coordinator.
pub struct InProcessApi {
    pub coordinator: UploadCoordinator,
}

#[async_trait]
impl StorageApi for InProcessApi {
    async fn initiate_upload(
        &self,
        object_id: &ObjectId,
        file_size: u64,
        overwrite: bool,
        md5: Option<&str>,
    ) -> Result<UploadSpecification> {
        self.coordinator
            .initiate_upload(object_id, file_size, overwrite, md5)
            .await
    }

    async fn get_progress(&self, object_id: &ObjectId) -> Result<UploadProgress> {
        self.coordinator.get_object_progress(object_id).await
    }

    async fn finalize_upload_part(
        &self,
        object_id: &ObjectId,
        upload_id: &UploadId,
        part_number: u32,
        md5: &str,
        etag: &str,
    ) -> Result<()> {
        self.coordinator
            .finalize_upload_part(object_id, upload_id, part_number, md5, etag)
            .await
    }

    async fn finalize_upload(&self, object_id: &ObjectId, upload_id: &UploadId) -> Result<()> {
        self.coordinator.finalize_upload(object_id, upload_id).await
    }

    async fn is_recoverable(&self, object_id: &ObjectId, file_size: u64) -> Result<bool> {
        self.coordinator.is_recoverable(object_id, file_size).await
    }

    async fn object_exists(&self, object_id: &ObjectId) -> Result<bool> {
        self.coordinator.object_exists(object_id).await
    }
}

/// Per-part transfer counters shared across transports.
#[derive(Default)]
pub struct TransferStats {
    puts: Mutex<HashMap<u32, u32>>,
    skips: Mutex<HashMap<u32, u32>>,
}

impl TransferStats {
    pub fn puts_of(&self, part_number: u32) -> u32 {
        *self.puts.lock().unwrap().get(&part_number).unwrap_or(&0)
    }

    pub fn skips_of(&self, part_number: u32) -> u32 {
        *self.skips.lock().unwrap().get(&part_number).unwrap_or(&0)
    }
}

enum FailPlan {
    Never,
    /// Fail the next built transport after this many part PUTs.
    Once(u32),
    /// Fail every built transport after this many part PUTs.
    Always(u32),
}

/// Builds transports that PUT directly against a [`MemoryBackend`], standing
/// in for HTTP PUTs to presigned URLs. Failure injection simulates dropped
/// connections and crashed processes.
pub struct LocalTransportBuilder {
    backend: Arc<MemoryBackend>,
    pub stats: Arc<TransferStats>,
    builds: AtomicUsize,
    fail_plan: Mutex<FailPlan>,
}

impl LocalTransportBuilder {
    pub fn new(backend: Arc<MemoryBackend>) -> Self {
        Self {
            backend,
            stats: Arc::new(TransferStats::default()),
            builds: AtomicUsize::new(0),
            fail_plan: Mutex::new(FailPlan::Never),
        }
    }

    pub fn fail_once_after(&self, puts: u32) {
        *self.fail_plan.lock().unwrap() = FailPlan::Once(puts);
    }

    pub fn fail_always_after(&self, puts: u32) {
        *self.fail_plan.lock().unwrap() = FailPlan::Always(puts);
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }
}

impl TransportBuilder for LocalTransportBuilder {
    fn build(&self, job: TransportJob) -> Box<dyn Transport> {
        self.builds.fetch_add(1, Ordering::Relaxed);
        let fail_after = {
            let mut plan = self.fail_plan.lock().unwrap();
            match *plan {
                FailPlan::Never => None,
                FailPlan::Once(n) => {
                    *plan = FailPlan::Never;
                    Some(n)
                }
                FailPlan::Always(n) => Some(n),
            }
        };
        Box::new(LocalTransport {
            backend: self.backend.clone(),
            stats: self.stats.clone(),
            job,
            fail_after,
        })
    }
}

struct LocalTransport {
    backend: Arc<MemoryBackend>,
    stats: Arc<TransferStats>,
    job: TransportJob,
    fail_after: Option<u32>,
}

/// Bucket key from a `memory://bucket/key?...` presigned URL.
fn parse_key(url: &str) -> Option<&str> {
    let rest = url.strip_prefix("memory://")?;
    let (path, _query) = rest.split_once('?')?;
    let (_bucket, key) = path.split_once('/')?;
    Some(key)
}

async fn read_part(file: &PathBuf, part: &Part) -> Result<Vec<u8>> {
    let mut f = tokio::fs::File::open(file)
        .await
        .map_err(UploadError::retryable)?;
    f.seek(std::io::SeekFrom::Start(part.offset))
        .await
        .map_err(UploadError::retryable)?;
    let mut body = vec![0u8; part.size as usize];
    f.read_exact(&mut body)
        .await
        .map_err(UploadError::retryable)?;
    Ok(body)
}

#[async_trait]
impl Transport for LocalTransport {
    async fn transfer(&self, api: &dyn StorageApi, progress: &Progress) -> Result<()> {
        let mut puts_done = 0u32;
        for part in &self.job.parts {
            if let Some(limit) = self.fail_after {
                if puts_done >= limit {
                    return Err(UploadError::retryable_msg("simulated connection loss"));
                }
            }

            if part.is_completed() {
                let local_md5 = file_part_md5(&self.job.file, part).await?;
                if part.md5.as_deref() == Some(local_md5.as_str()) {
                    *self
                        .stats
                        .skips
                        .lock()
                        .unwrap()
                        .entry(part.part_number)
                        .or_insert(0) += 1;
                    continue;
                }
            }

            let url = part.url.as_deref().ok_or_else(|| {
                UploadError::not_retryable(format!("part {} has no write URL", part.part_number))
            })?;
            let key = parse_key(url).ok_or_else(|| {
                UploadError::not_retryable(format!("malformed presigned URL: {url}"))
            })?;

            let body = read_part(&self.job.file, part).await?;
            let md5 = hex::encode(Md5::digest(&body));
            let etag = self
                .backend
                .put_part(key, &self.job.upload_id, part.part_number, Bytes::from(body))
                .map_err(UploadError::retryable)?;
            api.finalize_upload_part(
                &self.job.object_id,
                &self.job.upload_id,
                part.part_number,
                &md5,
                &etag,
            )
            .await?;

            *self
                .stats
                .puts
                .lock()
                .unwrap()
                .entry(part.part_number)
                .or_insert(0) += 1;
            progress.part_completed(part.part_number);
            puts_done += 1;
        }
        Ok(())
    }
}

/// An in-process coordinator plus transport wiring for driver tests.
pub struct TestCluster {
    pub backend: Arc<MemoryBackend>,
    pub api: Arc<InProcessApi>,
    pub transport: Arc<LocalTransportBuilder>,
    pub dir: TempDir,
}

pub async fn cluster() -> TestCluster {
    cluster_with_policy(small_policy()).await
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub async fn cluster_with_policy(policy: PartPolicy) -> TestCluster {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(MemoryBackend::new("test-bucket"));
    let state = Arc::new(
        SqliteStateStore::new(dir.path().join("state.db"))
            .await
            .unwrap(),
    );
    let config = CoordinatorConfig {
        policy,
        ..CoordinatorConfig::default()
    };
    let coordinator = UploadCoordinator::new(backend.clone(), state, config);
    TestCluster {
        transport: Arc::new(LocalTransportBuilder::new(backend.clone())),
        api: Arc::new(InProcessApi { coordinator }),
        backend,
        dir,
    }
}

impl TestCluster {
    /// A driver sharing this cluster's transport and coordinator, with its
    /// own session store (one per simulated client process).
    pub fn driver(&self, sessions: SessionStore, retry_count: i32) -> UploadDriver {
        UploadDriver::new(
            self.api.clone(),
            self.transport.clone(),
            sessions,
            ClientConfig {
                retry_count,
                quiet: true,
            },
        )
    }

    /// Write an upload source file into the cluster's scratch directory.
    pub fn write_file(&self, name: &str, content: &Bytes) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }
}
