/*!
 * Allocator Limits and Constants
 *
 * Centralized location for the thresholds and alignments shared by the
 * lock-free stack, the slab caches and the pool allocator.
 */

// =============================================================================
// SIZE CLASSES
// =============================================================================

/// Smallest permitted bucket size (8 bytes)
/// A freed small block must be able to hold a pointer-sized link
pub const MIN_CLASS_SIZE: usize = 8;

/// Classes at or above this size (1MB) are pooled in shared lock-free free lists
/// Below it, classes are served by per-class slab caches
pub const LARGE_THRESHOLD: usize = 1 << 20;

/// Alignment of every block handed out by the large and oversized paths (64 bytes)
/// [PERF] One cache line, so no two large blocks share a line
pub const LARGE_ALIGN: usize = 64;

/// log2 of the smallest default bucket (16 bytes)
pub const DEFAULT_MIN_CLASS_LOG2: u32 = 4;

/// Divisor applied to system memory to get the largest default bucket
pub const DEFAULT_MAX_CLASS_DIVISOR: u64 = 64;

/// Assumed system memory when detection fails (4GB)
pub const FALLBACK_SYSTEM_MEMORY: u64 = 4 * 1024 * 1024 * 1024;

// =============================================================================
// SLAB CACHES
// =============================================================================

/// Chunk size a slab cache requests from the system (1MB minus one cache line)
/// Leaves room for the system allocator's own header inside a 1MB region
pub const SLAB_CHUNK_BYTES: usize = (1 << 20) - 64;

/// Natural alignment cap for blocks carved out of a slab chunk
pub const SLAB_ALIGN: usize = 64;

/// Blocks carved per slow-path visit to the chunk lock
/// [PERF] Amortizes the mutex over several allocations
pub const SLAB_CARVE_BATCH: usize = 32;

// =============================================================================
// PRE-FAULTING
// =============================================================================

/// Block size used by `PoolAllocator::reserve` (1MB)
pub const RESERVE_BLOCK_SIZE: usize = 1 << 20;

/// Stride between touched bytes when pre-faulting (4KB)
/// [LINUX-COMPAT] Matches the base page size on x86-64 and aarch64
pub const PAGE_SIZE: usize = 4096;

// =============================================================================
// LOCK-FREE STACK
// =============================================================================

/// log2 of the node count in the first arena segment (32 nodes)
pub const ARENA_FIRST_SEGMENT_LOG2: u32 = 5;

/// Number of arena segments; segment `k` holds `32 << k` nodes
/// Together they cover every 32-bit node index
pub const ARENA_SEGMENTS: usize = 28;

/// Maximum number of nodes a single stack can create
/// Index 0 in the tagged head encodes the empty stack
pub const MAX_STACK_NODES: usize = u32::MAX as usize - 1;

/// Width of the generation counter in a stack's tagged head
/// The low `64 - HEAD_GENERATION_BITS` bits hold the node index.
/// The counter wraps after 2^32 pushes and pops on one stack, about 43 seconds
/// at 10^8 operations per second. A stale CAS can only succeed after stalling
/// for an exact multiple of that window with the same node back on top.
pub const HEAD_GENERATION_BITS: u32 = 32;

/// Round `value` up to the next multiple of `align` (a power of two)
#[inline(always)]
pub const fn round_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}
