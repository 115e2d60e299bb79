//! Storage error types.

use barge_core::UploadError;
use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("no such multipart session: {0}")]
    NoSuchUpload(String),

    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// Wrap an SDK or transport error.
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend(Box::new(err))
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Backend failures entering the protocol default to retryable; the
/// coordinator reserves the other classifications for semantically distinct
/// failures it detects itself.
impl From<StorageError> for UploadError {
    fn from(err: StorageError) -> Self {
        UploadError::retryable(err)
    }
}
