//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};

/// Backend part-size constraints used by the planner.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PartPolicy {
    /// Preferred part size in bytes.
    #[serde(default = "default_part_size")]
    pub part_size: u64,
    /// Smallest part the backend accepts (except the final part).
    #[serde(default = "default_min_part_size")]
    pub min_part_size: u64,
    /// Largest part the backend accepts.
    #[serde(default = "default_max_part_size")]
    pub max_part_size: u64,
    /// Maximum parts per multipart session.
    #[serde(default = "default_max_part_count")]
    pub max_part_count: u64,
}

/// Server-side coordinator configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Key prefix under which object blobs and metadata live.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Lifetime of per-part write authorizations, in days.
    ///
    /// SigV4 presigned URLs are capped at 7 days; the storage backend clamps.
    #[serde(default = "default_url_expiry_days")]
    pub url_expiry_days: u32,
    /// Part-size policy handed to the planner.
    #[serde(default)]
    pub policy: PartPolicy,
}

/// Client-side driver configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Upper bound on end-to-end upload attempts. Zero or negative means
    /// retry without bound.
    #[serde(default = "default_retry_count")]
    pub retry_count: i32,
    /// Suppress progress reporting.
    #[serde(default)]
    pub quiet: bool,
}

fn default_part_size() -> u64 {
    crate::DEFAULT_PART_SIZE
}

fn default_min_part_size() -> u64 {
    crate::DEFAULT_PART_SIZE
}

fn default_max_part_size() -> u64 {
    crate::MAX_PART_SIZE
}

fn default_max_part_count() -> u64 {
    crate::MAX_PART_COUNT
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_url_expiry_days() -> u32 {
    7
}

fn default_retry_count() -> i32 {
    5
}

impl Default for PartPolicy {
    fn default() -> Self {
        Self {
            part_size: default_part_size(),
            min_part_size: default_min_part_size(),
            max_part_size: default_max_part_size(),
            max_part_count: default_max_part_count(),
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            url_expiry_days: default_url_expiry_days(),
            policy: PartPolicy::default(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            retry_count: default_retry_count(),
            quiet: false,
        }
    }
}

impl ClientConfig {
    /// Number of attempts the retry loop will make.
    pub fn max_attempts(&self) -> u32 {
        if self.retry_count <= 0 {
            u32::MAX
        } else {
            self.retry_count as u32
        }
    }
}
