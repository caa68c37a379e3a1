/*!
 * Block Allocator
 *
 * Slab cache for one fixed block size.
 *
 * ## Design
 *
 * - Blocks are carved out of ~1MB chunks obtained from the system allocator
 * - Freed blocks go onto a lock-free stack and are handed out again first
 * - Carving takes a mutex, but refills a whole batch at once so the fast
 *   path (pop from the free stack) stays lock-free
 *
 * Chunks are only returned to the system by [`BlockAllocator::clear`] or on
 * drop; the cache never shrinks while in use.
 */

use super::size_class::natural_align;
use super::traits::SlabCache;
use crate::core::errors::{PoolError, PoolResult};
use crate::core::limits::{round_up, PAGE_SIZE, SLAB_ALIGN, SLAB_CARVE_BATCH, SLAB_CHUNK_BYTES};
use crate::core::sync::LockFreeStack;
use crate::core::types::BlockPtr;
use crate::monitoring::span_operation;
use parking_lot::Mutex;
use std::alloc::{alloc, dealloc, Layout};
use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, trace, warn};

/// Write one byte per page so the OS backs the range with real memory
///
/// # Safety
///
/// `block` must be valid for writes of `len` bytes and must not hold live
/// data.
pub(crate) unsafe fn prefault(block: BlockPtr, len: usize) {
    for offset in (0..len).step_by(PAGE_SIZE) {
        block.as_ptr().add(offset).write_volatile(0);
    }
}

/// Chunks owned by the cache; the last one is carved from
struct Chunks {
    list: Vec<BlockPtr>,
    carved: usize,
}

pub struct BlockAllocator {
    block_size: usize,
    block_align: usize,
    blocks_per_chunk: usize,
    free: LockFreeStack<BlockPtr>,
    chunks: Mutex<Chunks>,
    allocated: AtomicUsize,
    used: AtomicUsize,
}

impl BlockAllocator {
    /// Cache of `block_size`-byte blocks at their natural alignment
    pub fn new(block_size: usize) -> Self {
        let block_size = block_size.max(1);
        Self::build(block_size, natural_align(block_size))
    }

    /// Cache whose blocks are aligned to at least `align`
    ///
    /// The block size is rounded up to a multiple of the alignment.
    pub fn with_align(block_size: usize, align: usize) -> Self {
        let align = align.max(1).next_power_of_two();
        let block_size = round_up(block_size.max(1), align);
        Self::build(block_size, natural_align(block_size).max(align))
    }

    fn build(block_size: usize, block_align: usize) -> Self {
        let blocks_per_chunk = (SLAB_CHUNK_BYTES / block_size).max(1);
        debug!(block_size, block_align, blocks_per_chunk, "created block allocator");
        Self {
            block_size,
            block_align,
            blocks_per_chunk,
            free: LockFreeStack::new(),
            chunks: Mutex::new(Chunks {
                list: Vec::new(),
                carved: 0,
            }),
            allocated: AtomicUsize::new(0),
            used: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    #[inline]
    pub fn block_align(&self) -> usize {
        self.block_align
    }

    /// Chunks currently held from the system
    pub fn num_chunks(&self) -> usize {
        self.chunks.lock().list.len()
    }

    fn chunk_layout(&self) -> PoolResult<Layout> {
        let size = self.blocks_per_chunk * self.block_size;
        let align = self.block_align.max(SLAB_ALIGN);
        Layout::from_size_align(size, align).map_err(|_| PoolError::OutOfMemory { size, align })
    }

    /// Hand out one block
    #[inline]
    pub fn alloc(&self) -> PoolResult<NonNull<u8>> {
        if let Some(block) = self.free.pop() {
            self.used.fetch_add(1, Ordering::Relaxed);
            return Ok(block.as_non_null());
        }
        self.alloc_slow()
    }

    #[cold]
    fn alloc_slow(&self) -> PoolResult<NonNull<u8>> {
        let mut chunks = self.chunks.lock();

        // Another thread may have refilled while we waited for the lock
        let block = match self.free.pop() {
            Some(block) => block,
            None => {
                let block = self.carve(&mut chunks)?;
                // Refill from what is left of the current chunk only
                for _ in 1..SLAB_CARVE_BATCH {
                    if chunks.carved == self.blocks_per_chunk {
                        break;
                    }
                    match self.carve(&mut chunks) {
                        Ok(extra) => self.free.push(extra),
                        Err(_) => break,
                    }
                }
                block
            }
        };

        self.used.fetch_add(1, Ordering::Relaxed);
        Ok(block.as_non_null())
    }

    /// Carve the next block, starting a new chunk when the current one is full
    fn carve(&self, chunks: &mut Chunks) -> PoolResult<BlockPtr> {
        if chunks.list.is_empty() || chunks.carved == self.blocks_per_chunk {
            let layout = self.chunk_layout()?;
            // SAFETY: layout has non-zero size
            let chunk = NonNull::new(unsafe { alloc(layout) })
                .ok_or_else(|| PoolError::out_of_memory(layout))?;
            trace!(block_size = self.block_size, bytes = layout.size(), "new slab chunk");
            chunks.list.push(BlockPtr::new(chunk));
            chunks.carved = 0;
        }

        let Some(&base) = chunks.list.last() else {
            return Err(PoolError::OutOfMemory {
                size: self.block_size,
                align: self.block_align,
            });
        };
        // SAFETY: carved < blocks_per_chunk, so the block lies inside the chunk
        let ptr = unsafe { base.as_ptr().add(chunks.carved * self.block_size) };
        chunks.carved += 1;
        self.allocated.fetch_add(1, Ordering::Relaxed);

        // SAFETY: derived from a non-null chunk pointer
        Ok(BlockPtr::new(unsafe { NonNull::new_unchecked(ptr) }))
    }

    /// Return a block to the cache
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`alloc`](Self::alloc) on this cache and must not
    /// be freed twice.
    #[inline]
    pub unsafe fn free(&self, ptr: NonNull<u8>) {
        self.free.push(BlockPtr::new(ptr));
        self.used.fetch_sub(1, Ordering::Relaxed);
    }

    /// Make sure at least `blocks` blocks have been carved
    ///
    /// Newly carved blocks are touched page by page and placed on the free
    /// stack.
    pub fn reserve(&self, blocks: usize) -> PoolResult<()> {
        let span = span_operation("slab_reserve");
        let _guard = span.enter();
        span.record_bytes(blocks.saturating_mul(self.block_size));

        let mut chunks = self.chunks.lock();
        while self.allocated.load(Ordering::Relaxed) < blocks {
            let block = self.carve(&mut chunks)?;
            // SAFETY: freshly carved, nobody else can see it yet
            unsafe { prefault(block, self.block_size) };
            self.free.push(block);
        }
        Ok(())
    }

    /// Return every chunk to the system
    ///
    /// Refuses, with a warning, while blocks are still held by callers.
    ///
    /// # Safety
    ///
    /// No other thread may call into the cache during the clear.
    pub unsafe fn clear(&self) {
        let used = self.used.load(Ordering::Relaxed);
        if used > 0 {
            warn!(
                block_size = self.block_size,
                used, "not clearing block allocator: blocks still in use"
            );
            return;
        }

        let mut chunks = self.chunks.lock();
        while self.free.pop().is_some() {}
        self.release_chunks(&mut chunks);
    }

    fn release_chunks(&self, chunks: &mut Chunks) {
        if chunks.list.is_empty() {
            return;
        }
        match self.chunk_layout() {
            Ok(layout) => {
                for chunk in chunks.list.drain(..) {
                    // SAFETY: every chunk was allocated with this layout
                    unsafe { dealloc(chunk.as_ptr(), layout) };
                }
            }
            Err(err) => warn!(%err, "leaking slab chunks with unrepresentable layout"),
        }
        chunks.carved = 0;
        self.allocated.store(0, Ordering::Relaxed);
    }

    #[inline]
    pub fn num_allocated_blocks(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn num_used_blocks(&self) -> usize {
        self.used.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn num_used_bytes(&self) -> usize {
        self.num_used_blocks() * self.block_size
    }

    pub fn print_stats(&self) {
        println!(
            "block size = {}, allocated = {}, used = {}",
            self.block_size,
            self.num_allocated_blocks(),
            self.num_used_blocks()
        );
    }
}

impl SlabCache for BlockAllocator {
    fn new(block_size: usize) -> Self {
        BlockAllocator::new(block_size)
    }

    #[inline]
    fn alloc(&self) -> PoolResult<NonNull<u8>> {
        BlockAllocator::alloc(self)
    }

    #[inline]
    unsafe fn free(&self, ptr: NonNull<u8>) {
        BlockAllocator::free(self, ptr)
    }

    fn reserve(&self, blocks: usize) -> PoolResult<()> {
        BlockAllocator::reserve(self, blocks)
    }

    unsafe fn clear(&self) {
        BlockAllocator::clear(self)
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn num_allocated_blocks(&self) -> usize {
        BlockAllocator::num_allocated_blocks(self)
    }

    fn num_used_blocks(&self) -> usize {
        BlockAllocator::num_used_blocks(self)
    }
}

impl Drop for BlockAllocator {
    fn drop(&mut self) {
        let used = *self.used.get_mut();
        if used > 0 {
            warn!(
                block_size = self.block_size,
                used, "dropping block allocator with blocks still in use"
            );
        }
        let chunks = self.chunks.get_mut();
        let mut taken = Chunks {
            list: std::mem::take(&mut chunks.list),
            carved: 0,
        };
        self.release_chunks(&mut taken);
    }
}

impl fmt::Debug for BlockAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockAllocator")
            .field("block_size", &self.block_size)
            .field("block_align", &self.block_align)
            .field("allocated", &self.num_allocated_blocks())
            .field("used", &self.num_used_blocks())
            .finish()
    }
}
