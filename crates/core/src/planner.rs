//! Deterministic partitioning of a file into upload parts.

use crate::config::PartPolicy;
use crate::error::{Result, UploadError};
use crate::part::Part;

/// Partition `file_size` bytes into an ordered sequence of parts.
///
/// Pure function of the policy and the size: no I/O, no randomness. Re-planning
/// the same size yields byte-identical boundaries, which is what keeps resumed
/// and fresh specifications comparable.
///
/// Parts are `policy.part_size` each with a smaller final remainder (backends
/// exempt the last part from the minimum-size rule). When the file would need
/// more than `policy.max_part_count` parts at that size, the part size is
/// scaled up to the smallest size that fits the count limit.
///
/// A zero-byte file yields a single zero-size part: the backend accepts a
/// lone empty part, and downstream code then needs no empty-spec special case.
pub fn plan_parts(policy: &PartPolicy, file_size: u64) -> Result<Vec<Part>> {
    if file_size == 0 {
        return Ok(vec![Part::new(1, 0, 0)]);
    }

    let mut part_size = policy.part_size.clamp(policy.min_part_size, policy.max_part_size);
    if file_size.div_ceil(part_size) > policy.max_part_count {
        part_size = file_size.div_ceil(policy.max_part_count);
    }
    if part_size > policy.max_part_size {
        return Err(UploadError::not_retryable(format!(
            "file of {} bytes exceeds backend limit of {} parts x {} bytes",
            file_size, policy.max_part_count, policy.max_part_size
        )));
    }

    let count = file_size.div_ceil(part_size);
    let mut parts = Vec::with_capacity(count as usize);
    let mut offset = 0u64;
    for number in 1..=count {
        let size = part_size.min(file_size - offset);
        parts.push(Part::new(number as u32, offset, size));
        offset += size;
    }
    Ok(parts)
}
