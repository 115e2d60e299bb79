//! Core domain types and shared logic for barge resumable uploads.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Object and upload session identifiers
//! - Part geometry and completion state
//! - Upload specifications and progress projections
//! - The deterministic part planner
//! - Object/metadata key layout
//! - The shared error taxonomy driving the retry protocol

pub mod config;
pub mod error;
pub mod keys;
pub mod part;
pub mod planner;
pub mod progress;
pub mod upload;

pub use config::{ClientConfig, CoordinatorConfig, PartPolicy};
pub use error::{Result, UploadError};
pub use keys::{object_key, object_meta_key};
pub use part::{CompletedPart, Part};
pub use planner::plan_parts;
pub use progress::UploadProgress;
pub use upload::{ObjectId, UploadId, UploadSpecification};

/// Default part size: 5 MiB (the S3 minimum for all parts but the last).
pub const DEFAULT_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Maximum part size accepted by S3-compatible backends: 5 GiB.
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Maximum number of parts in one multipart session.
pub const MAX_PART_COUNT: u64 = 10_000;
