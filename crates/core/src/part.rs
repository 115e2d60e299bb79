//! Part geometry and completion state.

use serde::{Deserialize, Serialize};

/// One contiguous byte range of a multipart upload.
///
/// Part numbers are 1-based and contiguous; the parts of a specification
/// partition `[0, file_size)` exactly. The write authorization (`url`) is
/// time-limited and filled in by the coordinator at initiate; `md5`/`etag`
/// are recorded only when the part's upload has been verified.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Part {
    pub part_number: u32,
    pub offset: u64,
    pub size: u64,
    /// Presigned PUT URL for this part, if issued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Content md5 reported by the uploader, hex-encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
    /// Backend-issued entity tag proving the part was stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl Part {
    /// A pending part with geometry only.
    pub fn new(part_number: u32, offset: u64, size: u64) -> Self {
        Self {
            part_number,
            offset,
            size,
            url: None,
            md5: None,
            etag: None,
        }
    }

    /// True once both checksum and entity tag have been recorded.
    pub fn is_completed(&self) -> bool {
        self.md5.is_some() && self.etag.is_some()
    }

    /// HTTP `Range`-style value selecting this part's bytes.
    pub fn http_range(&self) -> String {
        format!("bytes={}-{}", self.offset, self.offset + self.size.saturating_sub(1))
    }
}

/// Completion proof for one part: the input to the backend's
/// complete-multipart call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    pub part_number: u32,
    pub etag: String,
}

impl CompletedPart {
    pub fn new(part_number: u32, etag: impl Into<String>) -> Self {
        Self {
            part_number,
            etag: etag.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_range_is_inclusive() {
        let part = Part::new(2, 5_000_000, 5_000_000);
        assert_eq!(part.http_range(), "bytes=5000000-9999999");
    }

    #[test]
    fn test_http_range_of_empty_part() {
        // Degenerate but representable: a zero-size part for an empty object.
        let part = Part::new(1, 0, 0);
        assert_eq!(part.http_range(), "bytes=0-0");
    }

    #[test]
    fn test_completion_requires_md5_and_etag() {
        let mut part = Part::new(1, 0, 10);
        assert!(!part.is_completed());
        part.md5 = Some("d41d8cd98f00b204e9800998ecf8427e".to_string());
        assert!(!part.is_completed());
        part.etag = Some("\"d41d8cd98f00b204e9800998ecf8427e\"".to_string());
        assert!(part.is_completed());
    }
}
