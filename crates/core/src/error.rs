//! The shared error taxonomy for the upload protocol.
//!
//! Every failure crossing the coordinator or driver boundary is classified
//! into one of five categories, and the classification is what drives the
//! client retry loop:
//!
//! - [`UploadError::Retryable`] — transient backend/service failure; the
//!   enclosing retry loop should simply try again.
//! - [`UploadError::NotRetryable`] — this specific call cannot succeed as
//!   made; the caller may still make progress by switching strategy
//!   (recover-and-resume or re-initiate).
//! - [`UploadError::NotResumable`] — resumption is impossible given the
//!   current session state; fatal, no retry.
//! - [`UploadError::Internal`] — programming or serialization defect; never
//!   retried.
//! - [`UploadError::IdNotFound`] — no known state for the requested object,
//!   distinguishing "nothing to resume" from an actual fault.

use thiserror::Error;

/// Protocol-level error classification.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("transient backend failure: {source}")]
    Retryable {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("operation cannot succeed as called: {0}")]
    NotRetryable(String),

    #[error("upload cannot be resumed: {0}")]
    NotResumable(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("no upload state for object {0}")]
    IdNotFound(String),
}

impl UploadError {
    /// Wrap a transient source error.
    pub fn retryable<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Retryable {
            source: Box::new(source),
        }
    }

    /// A transient failure described only by a message.
    pub fn retryable_msg(msg: impl Into<String>) -> Self {
        Self::Retryable {
            source: msg.into().into(),
        }
    }

    pub fn not_retryable(msg: impl Into<String>) -> Self {
        Self::NotRetryable(msg.into())
    }

    pub fn not_resumable(msg: impl Into<String>) -> Self {
        Self::NotResumable(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True when repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }

    /// True when the error must propagate to the caller without consuming a
    /// retry: conflicting sessions and internal defects.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NotResumable(_) | Self::Internal(_))
    }
}

/// Result type alias for protocol operations.
pub type Result<T, E = UploadError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_flags() {
        assert!(UploadError::retryable_msg("blip").is_retryable());
        assert!(!UploadError::retryable_msg("blip").is_fatal());
        assert!(!UploadError::not_retryable("bad input").is_retryable());
        assert!(!UploadError::not_retryable("bad input").is_fatal());
        assert!(UploadError::not_resumable("conflict").is_fatal());
        assert!(UploadError::internal("bug").is_fatal());
        assert!(!UploadError::IdNotFound("abc".into()).is_fatal());
    }
}
