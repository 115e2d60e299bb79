//! Object store backends for barge.
//!
//! The [`ObjectStore`] trait is the capability interface the upload
//! coordinator consumes: initiate/complete/abort multipart sessions, presign
//! per-part write URLs, list stored parts, and put/stat whole objects. Two
//! implementations are provided: [`S3Backend`] for S3-compatible services and
//! [`MemoryBackend`] for tests and local development.

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::memory::MemoryBackend;
pub use backends::s3::S3Backend;
pub use error::{StorageError, StorageResult};
pub use traits::{normalize_etag, MultipartUploadSummary, ObjectMeta, ObjectStore, PartSummary};
