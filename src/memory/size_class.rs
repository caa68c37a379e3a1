/*!
 * Size-Class Table
 *
 * Ordered bucket sizes, split at the large threshold into:
 * - **Small** classes (< 1MB): served by per-class slab caches
 * - **Large** classes (>= 1MB): served by shared lock-free free lists
 *
 * Requests above the largest class are **oversized** and bypass pooling.
 *
 * The default table uses powers of two from 16 bytes up to
 * `system_memory / 64`, which bounds internal fragmentation to roughly 2x
 * while keeping the number of classes logarithmic.
 */

use super::system::system_memory;
use crate::core::errors::{PoolError, PoolResult};
use crate::core::limits::{
    DEFAULT_MAX_CLASS_DIVISOR, DEFAULT_MIN_CLASS_LOG2, LARGE_ALIGN, LARGE_THRESHOLD,
    MIN_CLASS_SIZE, SLAB_ALIGN,
};
use serde::Serialize;

/// Bucket a request is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeClass {
    /// Index into the small classes
    Small(usize),
    /// Index into the large classes
    Large(usize),
    /// Larger than every class; served directly by the system allocator
    Oversized,
}

/// Alignment a slab cache of `block_size` blocks guarantees without padding
///
/// Blocks sit at multiples of their size inside a chunk aligned to
/// [`SLAB_ALIGN`], so the lowest set bit of the size bounds their alignment.
#[inline]
pub const fn natural_align(block_size: usize) -> usize {
    if block_size == 0 {
        return SLAB_ALIGN;
    }
    let low_bit = 1 << block_size.trailing_zeros();
    if low_bit < SLAB_ALIGN {
        low_bit
    } else {
        SLAB_ALIGN
    }
}

/// ceil(log2(value)), 0 for values <= 1
#[inline]
pub const fn log2_up(value: u64) -> u32 {
    if value <= 1 {
        0
    } else {
        u64::BITS - (value - 1).leading_zeros()
    }
}

/// Validated, strictly increasing list of bucket sizes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SizeClassTable {
    sizes: Vec<usize>,
    num_small: usize,
}

impl SizeClassTable {
    /// Validate a bucket list
    ///
    /// Fails if the list is empty, if the first class is below 8 bytes, or if
    /// the sizes do not strictly increase.
    pub fn new(sizes: Vec<usize>) -> PoolResult<Self> {
        let Some(&first) = sizes.first() else {
            return Err(PoolError::EmptySizeTable);
        };
        if first < MIN_CLASS_SIZE {
            return Err(PoolError::ClassTooSmall {
                size: first,
                minimum: MIN_CLASS_SIZE,
            });
        }
        for (index, pair) in sizes.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(PoolError::NonIncreasing {
                    index: index + 1,
                    previous: pair[0],
                    size: pair[1],
                });
            }
        }

        Ok(Self::from_sorted(sizes))
    }

    fn from_sorted(sizes: Vec<usize>) -> Self {
        let num_small = sizes.partition_point(|&size| size < LARGE_THRESHOLD);
        Self { sizes, num_small }
    }

    /// Powers of two from `2^min_log2` to `2^max_log2` inclusive
    ///
    /// Exponents are clamped so the table is always valid.
    pub fn powers_of_two(min_log2: u32, max_log2: u32) -> Self {
        let min_log2 = min_log2.max(MIN_CLASS_SIZE.trailing_zeros());
        let max_log2 = max_log2.clamp(min_log2, usize::BITS - 2);
        Self::from_sorted((min_log2..=max_log2).map(|exp| 1usize << exp).collect())
    }

    /// Default table derived from the installed system memory
    pub fn system_default() -> Self {
        let max_log2 = log2_up(system_memory() / DEFAULT_MAX_CLASS_DIVISOR);
        Self::powers_of_two(DEFAULT_MIN_CLASS_LOG2, max_log2)
    }

    #[inline]
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    #[inline]
    pub fn into_sizes(self) -> Vec<usize> {
        self.sizes
    }

    #[inline]
    pub fn small_sizes(&self) -> &[usize] {
        &self.sizes[..self.num_small]
    }

    #[inline]
    pub fn large_sizes(&self) -> &[usize] {
        &self.sizes[self.num_small..]
    }

    #[inline]
    pub fn num_small(&self) -> usize {
        self.num_small
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    /// Always false for a validated table
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Largest small class, 0 when every class is large
    #[inline]
    pub fn max_small(&self) -> usize {
        self.small_sizes().last().copied().unwrap_or(0)
    }

    /// Largest class of any kind
    #[inline]
    pub fn max_size(&self) -> usize {
        self.sizes.last().copied().unwrap_or(0)
    }

    /// Alignment guaranteed by blocks of class `index`
    #[inline]
    pub fn class_align(&self, index: usize) -> usize {
        if index < self.num_small {
            natural_align(self.sizes[index])
        } else {
            LARGE_ALIGN
        }
    }

    /// Route a request of `size` bytes
    #[inline]
    pub fn classify(&self, size: usize) -> SizeClass {
        self.classify_aligned(size, 1)
    }

    /// Route a request of `size` bytes that needs `align` alignment
    ///
    /// Picks the smallest class that holds `size` and whose blocks are
    /// aligned to at least `align`.
    pub fn classify_aligned(&self, size: usize, align: usize) -> SizeClass {
        if align > LARGE_ALIGN {
            return SizeClass::Oversized;
        }

        let mut index = self.sizes.partition_point(|&class| class < size);
        while index < self.sizes.len() && self.class_align(index) < align {
            index += 1;
        }

        if index < self.num_small {
            SizeClass::Small(index)
        } else if index < self.sizes.len() {
            SizeClass::Large(index - self.num_small)
        } else {
            SizeClass::Oversized
        }
    }
}

/// Bucket sizes of the default allocator
pub fn default_sizes() -> Vec<usize> {
    SizeClassTable::system_default().into_sizes()
}
