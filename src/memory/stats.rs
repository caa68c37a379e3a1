/*!
 * Pool Statistics
 * Point-in-time snapshot of bucket occupancy, printable or serializable
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Occupancy of one small size class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketStats {
    pub size: usize,
    pub allocated_blocks: usize,
    pub used_blocks: usize,
}

impl BucketStats {
    #[inline]
    pub fn allocated_bytes(&self) -> usize {
        self.size * self.allocated_blocks
    }

    #[inline]
    pub fn used_bytes(&self) -> usize {
        self.size * self.used_blocks
    }
}

/// Free blocks parked in one large size class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LargeBucketStats {
    pub size: usize,
    pub pooled_blocks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub small: Vec<BucketStats>,
    pub large: Vec<LargeBucketStats>,
    /// Bytes currently obtained from the system for large and oversized blocks
    pub large_allocated_bytes: usize,
    pub total_allocated_bytes: usize,
    /// Bytes held by callers in small classes
    pub total_used_bytes: usize,
}

impl PoolStats {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bucket in &self.small {
            writeln!(
                f,
                "size = {}, allocated = {}, used = {}",
                bucket.size, bucket.allocated_blocks, bucket.used_blocks
            )?;
        }
        writeln!(f, "Large allocated = {}", self.large_allocated_bytes)?;
        writeln!(f, "Total bytes allocated = {}", self.total_allocated_bytes)?;
        writeln!(f, "Total bytes used = {}", self.total_used_bytes)
    }
}
