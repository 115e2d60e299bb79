//! S3-compatible storage backend using the AWS SDK.

use crate::error::{StorageError, StorageResult};
use crate::traits::{MultipartUploadSummary, ObjectMeta, ObjectStore, PartSummary};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart as S3CompletedPart};
use aws_sdk_s3::Client;
use barge_core::{CompletedPart, UploadId};
use bytes::Bytes;
use std::time::Duration;
use tracing::instrument;

/// SigV4 presigned URLs cannot outlive 7 days; longer requests are clamped.
const MAX_PRESIGN_EXPIRY: Duration = Duration::from_secs(7 * 24 * 3600);

/// S3-compatible object store using the AWS SDK.
pub struct S3Backend {
    client: Client,
    bucket: String,
    prefix: Option<String>,
}

impl std::fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Backend")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl S3Backend {
    /// Create a new S3 backend.
    ///
    /// # Arguments
    /// * `endpoint` - Override for MinIO/Ceph and other S3-compatible
    ///   services; bare `host:port` values get an `http://` scheme.
    /// * `force_path_style` - Use path-style URLs (`endpoint/bucket/key`).
    ///   Required for MinIO; AWS S3 itself wants virtual-hosted style.
    pub async fn new(
        bucket: &str,
        endpoint: Option<String>,
        region: Option<String>,
        prefix: Option<String>,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        force_path_style: bool,
    ) -> StorageResult<Self> {
        if access_key_id.is_some() != secret_access_key.is_some() {
            return Err(StorageError::Config(
                "s3 config requires both access_key_id and secret_access_key when either is set"
                    .to_string(),
            ));
        }

        let resolved_region = region.unwrap_or_else(|| "us-east-1".to_string());
        let mut config_builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(aws_config::Region::new(resolved_region.clone()));

        if let (Some(key_id), Some(secret)) = (access_key_id, secret_access_key) {
            let credentials =
                aws_sdk_s3::config::Credentials::new(key_id, secret, None, None, "barge-config");
            config_builder = config_builder.credentials_provider(credentials);
        } else {
            let chain = aws_config::default_provider::credentials::DefaultCredentialsChain::builder()
                .region(aws_config::Region::new(resolved_region))
                .build()
                .await;
            config_builder = config_builder.credentials_provider(chain);
        }

        if let Some(endpoint_url) = endpoint {
            // Handle bare host:port endpoints (e.g., "minio:9000").
            let lower = endpoint_url.to_ascii_lowercase();
            let normalized = if lower.starts_with("http://") || lower.starts_with("https://") {
                endpoint_url
            } else {
                format!("http://{}", endpoint_url)
            };
            config_builder = config_builder.endpoint_url(normalized);
        }

        if force_path_style {
            config_builder = config_builder.force_path_style(true);
        }

        let client = Client::from_conf(config_builder.build());
        let normalized_prefix = prefix.map(|p| p.trim_end_matches('/').to_string());

        Ok(Self {
            client,
            bucket: bucket.to_string(),
            prefix: normalized_prefix,
        })
    }

    /// Full object key with the configured prefix applied.
    fn full_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix, key),
            None => key.to_string(),
        }
    }

    /// Key relative to the configured prefix.
    fn strip_prefix(&self, full_key: &str) -> String {
        match &self.prefix {
            Some(prefix) => {
                let prefix_with_slash = format!("{}/", prefix);
                full_key
                    .strip_prefix(&prefix_with_slash)
                    .unwrap_or(full_key)
                    .to_string()
            }
            None => full_key.to_string(),
        }
    }

    /// Convert an AWS SDK error to StorageError, mapping 404s to NotFound.
    fn map_sdk_error<E>(err: aws_sdk_s3::error::SdkError<E>, key: &str) -> StorageError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        if let aws_sdk_s3::error::SdkError::ServiceError(ref service_err) = err {
            if service_err.raw().status().as_u16() == 404 {
                return StorageError::NotFound(key.to_string());
            }
        }
        StorageError::backend(err)
    }
}

#[async_trait]
impl ObjectStore for S3Backend {
    #[instrument(skip(self), fields(backend = "s3"))]
    async fn initiate_multipart(&self, key: &str) -> StorageResult<UploadId> {
        let full_key = self.full_key(key);
        let output = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(&full_key)
            .send()
            .await
            .map_err(StorageError::backend)?;

        let upload_id = output
            .upload_id()
            .ok_or_else(|| StorageError::Config("S3 did not return an upload_id".to_string()))?;
        Ok(UploadId::from(upload_id))
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn presign_part(
        &self,
        key: &str,
        upload_id: &UploadId,
        part_number: u32,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let full_key = self.full_key(key);
        let presign_config = PresigningConfig::expires_in(expires_in.min(MAX_PRESIGN_EXPIRY))
            .map_err(StorageError::backend)?;

        let presigned = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(&full_key)
            .upload_id(upload_id.as_str())
            .part_number(part_number as i32)
            .presigned(presign_config)
            .await
            .map_err(StorageError::backend)?;

        Ok(presigned.uri().to_string())
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn list_parts(
        &self,
        key: &str,
        upload_id: &UploadId,
        part_number_marker: u32,
        max_parts: u32,
    ) -> StorageResult<Vec<PartSummary>> {
        let full_key = self.full_key(key);
        let output = self
            .client
            .list_parts()
            .bucket(&self.bucket)
            .key(&full_key)
            .upload_id(upload_id.as_str())
            .part_number_marker(part_number_marker.to_string())
            .max_parts(max_parts as i32)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, key))?;

        let mut parts = Vec::new();
        for part in output.parts() {
            let (Some(number), Some(etag)) = (part.part_number(), part.e_tag()) else {
                continue;
            };
            parts.push(PartSummary {
                part_number: number as u32,
                etag: etag.to_string(),
            });
        }
        Ok(parts)
    }

    #[instrument(skip(self, parts), fields(backend = "s3", parts = parts.len()))]
    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &UploadId,
        parts: &[CompletedPart],
    ) -> StorageResult<()> {
        let full_key = self.full_key(key);
        let completed = parts
            .iter()
            .map(|p| {
                S3CompletedPart::builder()
                    .part_number(p.part_number as i32)
                    .e_tag(&p.etag)
                    .build()
            })
            .collect::<Vec<_>>();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(&full_key)
            .upload_id(upload_id.as_str())
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, key))?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn abort_multipart(&self, key: &str, upload_id: &UploadId) -> StorageResult<()> {
        let full_key = self.full_key(key);
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(&full_key)
            .upload_id(upload_id.as_str())
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, key))?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn list_multipart_uploads(&self) -> StorageResult<Vec<MultipartUploadSummary>> {
        let mut uploads = Vec::new();
        let mut key_marker: Option<String> = None;
        let mut id_marker: Option<String> = None;

        loop {
            let mut request = self.client.list_multipart_uploads().bucket(&self.bucket);
            if let Some(prefix) = &self.prefix {
                request = request.prefix(format!("{}/", prefix));
            }
            if let Some(marker) = key_marker.take() {
                request = request.key_marker(marker);
            }
            if let Some(marker) = id_marker.take() {
                request = request.upload_id_marker(marker);
            }

            let output = request.send().await.map_err(StorageError::backend)?;
            for upload in output.uploads() {
                let (Some(key), Some(id)) = (upload.key(), upload.upload_id()) else {
                    continue;
                };
                uploads.push(MultipartUploadSummary {
                    key: self.strip_prefix(key),
                    upload_id: UploadId::from(id),
                });
            }

            if output.is_truncated() == Some(true) {
                key_marker = output.next_key_marker().map(|s| s.to_string());
                id_marker = output.next_upload_id_marker().map(|s| s.to_string());
            } else {
                break;
            }
        }
        Ok(uploads)
    }

    #[instrument(skip(self, data), fields(backend = "s3", size = data.len()))]
    async fn put_object(&self, key: &str, data: Bytes) -> StorageResult<()> {
        let full_key = self.full_key(key);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .body(data.into())
            .send()
            .await
            .map_err(StorageError::backend)?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn object_metadata(&self, key: &str) -> StorageResult<ObjectMeta> {
        let full_key = self.full_key(key);
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, key))?;

        let last_modified = output
            .last_modified()
            .and_then(|dt| time::OffsetDateTime::from_unix_timestamp(dt.secs()).ok());

        Ok(ObjectMeta {
            size: output.content_length().unwrap_or(0) as u64,
            last_modified,
        })
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn bucket_exists(&self) -> StorageResult<bool> {
        match self
            .client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                if let aws_sdk_s3::error::SdkError::ServiceError(ref service_err) = err {
                    if service_err.raw().status().as_u16() == 404 {
                        return Ok(false);
                    }
                }
                Err(StorageError::backend(err))
            }
        }
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}
