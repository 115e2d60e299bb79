//! State store error types.

use barge_core::UploadError;
use thiserror::Error;

/// State store operation errors.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("no upload state for object {object_id}")]
    IdNotFound { object_id: String },

    #[error("no part {part_number} for object {object_id}")]
    PartNotFound { object_id: String, part_number: u32 },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt state: {0}")]
    Corrupt(String),
}

/// Result type for state store operations.
pub type StateResult<T> = std::result::Result<T, StateError>;

impl From<StateError> for UploadError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::IdNotFound { object_id } => UploadError::IdNotFound(object_id),
            StateError::PartNotFound { .. } => UploadError::not_retryable(err.to_string()),
            StateError::Database(_) => UploadError::retryable(err),
            StateError::Corrupt(msg) => UploadError::internal(msg),
        }
    }
}
