#![allow(dead_code)]

use barge_core::{CoordinatorConfig, PartPolicy, UploadSpecification};
use barge_coordinator::UploadCoordinator;
use barge_state::SqliteStateStore;
use barge_storage::{normalize_etag, MemoryBackend};
use bytes::Bytes;
use std::sync::Arc;
use tempfile::TempDir;

/// Part size used by the test policy; small enough to make multi-part
/// uploads out of a few KiB of data.
pub const PART_SIZE: u64 = 1024;

pub struct Harness {
    pub backend: Arc<MemoryBackend>,
    pub coordinator: UploadCoordinator,
    _dir: TempDir,
}

pub async fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(MemoryBackend::new("test-bucket"));
    let state = Arc::new(
        SqliteStateStore::new(dir.path().join("state.db"))
            .await
            .unwrap(),
    );
    let config = CoordinatorConfig {
        policy: PartPolicy {
            part_size: PART_SIZE,
            min_part_size: PART_SIZE,
            ..PartPolicy::default()
        },
        ..CoordinatorConfig::default()
    };
    let coordinator = UploadCoordinator::new(backend.clone(), state, config);
    Harness {
        backend,
        coordinator,
        _dir: dir,
    }
}

/// Deterministic pseudo-random content so assertions can regenerate it.
pub fn test_bytes(len: usize) -> Bytes {
    let mut data = Vec::with_capacity(len);
    let mut x: u32 = 0x2545_f491;
    for _ in 0..len {
        x = x.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        data.push((x >> 24) as u8);
    }
    Bytes::from(data)
}

/// Store one part's bytes on the backend, as the client transport would via
/// its presigned URL. Returns `(md5, etag)` ready for finalize.
pub fn upload_part(
    harness: &Harness,
    spec: &UploadSpecification,
    part_number: u32,
    content: &Bytes,
) -> (String, String) {
    let part = spec
        .parts
        .iter()
        .find(|p| p.part_number == part_number)
        .unwrap();
    let body = content.slice(part.offset as usize..(part.offset + part.size) as usize);
    let etag = harness
        .backend
        .put_part(&spec.object_key, &spec.upload_id, part_number, body)
        .unwrap();
    let md5 = normalize_etag(&etag).to_string();
    (md5, etag)
}
