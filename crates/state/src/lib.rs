//! Durable upload state for the barge coordinator.
//!
//! The state store is the authoritative ledger of per-part completion for
//! every in-flight upload session, keyed by `(object_id, upload_id)`. The
//! SQLite implementation follows the coordinator through restarts; the trait
//! keeps the coordinator testable against alternative stores.

pub mod error;
pub mod models;
pub mod store;

pub use error::{StateError, StateResult};
pub use store::{SqliteStateStore, UploadStateStore};
