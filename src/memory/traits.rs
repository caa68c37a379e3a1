/*!
 * Memory Traits
 * Slab cache abstraction used by the pool for small size classes
 */

use crate::core::errors::PoolResult;
use std::ptr::NonNull;

/// Fixed-size block cache backing one small size class
///
/// Every block handed out by [`alloc`](SlabCache::alloc) is exactly
/// [`block_size`](SlabCache::block_size) bytes.
pub trait SlabCache: Send + Sync {
    /// Create an empty cache of `block_size`-byte blocks
    fn new(block_size: usize) -> Self
    where
        Self: Sized;

    /// Hand out one block
    fn alloc(&self) -> PoolResult<NonNull<u8>>;

    /// Return a block to the cache
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`alloc`](SlabCache::alloc) on this cache and
    /// must not be freed twice.
    unsafe fn free(&self, ptr: NonNull<u8>);

    /// Make sure at least `blocks` blocks exist, touching new memory
    fn reserve(&self, blocks: usize) -> PoolResult<()>;

    /// Return all cached memory to the system
    ///
    /// # Safety
    ///
    /// No other thread may be using the cache, and blocks still held by
    /// callers must not be used afterwards if the cache releases them.
    unsafe fn clear(&self);

    fn block_size(&self) -> usize;

    /// Blocks carved from system memory so far
    fn num_allocated_blocks(&self) -> usize;

    /// Blocks currently held by callers
    fn num_used_blocks(&self) -> usize;

    /// Bytes currently held by callers
    fn num_used_bytes(&self) -> usize {
        self.num_used_blocks() * self.block_size()
    }
}
