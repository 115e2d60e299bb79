//! Server-side coordination of resumable multipart uploads.
//!
//! The coordinator owns the authoritative upload protocol: it opens multipart
//! sessions against the storage backend, plans and presigns parts, verifies
//! part completions against the backend before recording them, and stitches
//! finished sessions into final objects with a `.meta` companion. Durable
//! state lives in a [`barge_state::UploadStateStore`]; the backend is any
//! [`barge_storage::ObjectStore`].

pub mod coordinator;

pub use coordinator::UploadCoordinator;
