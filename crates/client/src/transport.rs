//! The transfer seam between the driver and concrete byte movers.

use crate::api::StorageApi;
use crate::progress::Progress;
use async_trait::async_trait;
use barge_core::{ObjectId, Part, Result, UploadError, UploadId};
use md5::{Digest, Md5};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// One transfer assignment: the parts of a session a transport should move
/// from a local file.
///
/// Parts with completion fields set are re-validation candidates: the
/// transport checksums the local byte range and skips the part when the
/// checksum matches the recorded one, re-uploading otherwise.
#[derive(Clone, Debug)]
pub struct TransportJob {
    pub object_id: ObjectId,
    pub upload_id: UploadId,
    pub parts: Vec<Part>,
    pub file: PathBuf,
}

/// Moves a job's parts to the backend via their presigned URLs, reporting
/// each verified completion through the [`StorageApi`].
///
/// Finalizing the whole upload is the driver's job, never the transport's.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn transfer(&self, api: &dyn StorageApi, progress: &Progress) -> Result<()>;
}

/// Creates a [`Transport`] per upload attempt.
pub trait TransportBuilder: Send + Sync {
    fn build(&self, job: TransportJob) -> Box<dyn Transport>;
}

/// Hex md5 of one part's byte range of a local file.
///
/// Shared by transports for upload integrity and for re-validating
/// previously completed parts.
pub async fn file_part_md5(path: &Path, part: &Part) -> Result<String> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(UploadError::retryable)?;
    file.seek(std::io::SeekFrom::Start(part.offset))
        .await
        .map_err(UploadError::retryable)?;

    let mut hasher = Md5::new();
    let mut remaining = part.size;
    let mut buf = vec![0u8; 64 * 1024];
    while remaining > 0 {
        let want = buf.len().min(remaining as usize);
        let read = file
            .read(&mut buf[..want])
            .await
            .map_err(UploadError::retryable)?;
        if read == 0 {
            return Err(UploadError::not_retryable(format!(
                "file truncated: part {} needs {} more bytes",
                part.part_number, remaining
            )));
        }
        hasher.update(&buf[..read]);
        remaining -= read as u64;
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_file_part_md5_hashes_only_the_range() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"aaaabbbbcccc").unwrap();

        let md5 = file_part_md5(file.path(), &Part::new(2, 4, 4)).await.unwrap();
        assert_eq!(md5, hex::encode(Md5::digest(b"bbbb")));
    }

    #[tokio::test]
    async fn test_file_part_md5_of_empty_part() {
        let file = NamedTempFile::new().unwrap();
        let md5 = file_part_md5(file.path(), &Part::new(1, 0, 0)).await.unwrap();
        assert_eq!(md5, hex::encode(Md5::digest(b"")));
    }

    #[tokio::test]
    async fn test_truncated_file_is_not_retryable() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"short").unwrap();
        let err = file_part_md5(file.path(), &Part::new(1, 0, 100))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::NotRetryable(_)));
    }
}
