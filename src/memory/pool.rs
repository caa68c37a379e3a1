/*!
 * Pool Allocator
 *
 * Size-class allocator for parallel workloads.
 *
 * ## Routing
 *
 * ```text
 * n <= max_small         -> smallest small class >= n  -> slab cache
 * n <= max_size          -> smallest large class >= n  -> lock-free free list
 * otherwise (oversized)  -> system allocator, never pooled
 * ```
 *
 * Large blocks are obtained from the system on a free-list miss, rounded up
 * to 64 bytes and aligned to 64. They return to their free list on
 * deallocation and stay there until [`PoolAllocator::clear`].
 *
 * ## Accounting
 *
 * `large_allocated_bytes` counts every byte currently obtained from the
 * system for large and oversized blocks, pooled or not. It is incremented
 * and decremented with the same rounded size.
 */

use super::config::PoolConfig;
use super::size_class::{SizeClass, SizeClassTable};
use super::slab::{prefault, BlockAllocator};
use super::stats::{BucketStats, LargeBucketStats, PoolStats};
use super::traits::SlabCache;
use crate::core::errors::{PoolError, PoolResult};
use crate::core::limits::{LARGE_ALIGN, RESERVE_BLOCK_SIZE};
use crate::core::sync::LockFreeStack;
use crate::core::types::BlockPtr;
use crate::monitoring::span_operation;
use crossbeam_utils::CachePadded;
use rayon::prelude::*;
use std::alloc::{alloc, dealloc, Layout};
use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, trace, warn};

/// Layout of a block served directly by the system allocator
fn raw_layout(size: usize, align: usize) -> PoolResult<Layout> {
    size.max(1)
        .checked_next_multiple_of(align)
        .and_then(|rounded| Layout::from_size_align(rounded, align).ok())
        .ok_or(PoolError::OutOfMemory { size, align })
}

pub struct PoolAllocator<S: SlabCache = BlockAllocator> {
    table: SizeClassTable,
    small: Box<[S]>,
    large: Box<[LockFreeStack<BlockPtr>]>,
    large_allocated: CachePadded<AtomicUsize>,
}

impl PoolAllocator {
    /// Pool over `sizes`, which must be non-empty, start at 8 bytes or more
    /// and strictly increase
    pub fn new(sizes: Vec<usize>) -> PoolResult<Self> {
        Ok(Self::from_table(SizeClassTable::new(sizes)?))
    }

    /// Pool over [`default_sizes`](super::default_sizes)
    pub fn with_default_sizes() -> Self {
        Self::from_table(SizeClassTable::system_default())
    }

    /// Pool from a configuration, pre-faulting `reserve_bytes` if set
    pub fn from_config(config: &PoolConfig) -> PoolResult<Self> {
        let pool = Self::from_table(config.table()?);
        if config.reserve_bytes > 0 {
            pool.reserve(config.reserve_bytes)?;
        }
        Ok(pool)
    }
}

impl<S: SlabCache> PoolAllocator<S> {
    /// Pool over an already validated table, with one `S` per small class
    pub fn from_table(table: SizeClassTable) -> Self {
        let small: Box<[S]> = table.small_sizes().iter().map(|&size| S::new(size)).collect();
        let large: Box<[LockFreeStack<BlockPtr>]> =
            table.large_sizes().iter().map(|_| LockFreeStack::new()).collect();

        debug!(
            small_classes = small.len(),
            large_classes = large.len(),
            max_small = table.max_small(),
            max_size = table.max_size(),
            "created pool allocator"
        );

        Self {
            table,
            small,
            large,
            large_allocated: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    #[inline]
    pub fn table(&self) -> &SizeClassTable {
        &self.table
    }

    #[inline]
    pub fn sizes(&self) -> &[usize] {
        self.table.sizes()
    }

    #[inline]
    pub fn num_small_classes(&self) -> usize {
        self.table.num_small()
    }

    #[inline]
    pub fn classify(&self, size: usize) -> SizeClass {
        self.table.classify(size)
    }

    /// Slab cache behind small class `index`
    #[inline]
    pub fn slab(&self, index: usize) -> Option<&S> {
        self.small.get(index)
    }

    /// Blocks parked in large class `index`
    pub fn large_pooled(&self, index: usize) -> usize {
        self.large.get(index).map_or(0, |bucket| bucket.size())
    }

    /// Bytes currently obtained from the system for large and oversized blocks
    #[inline]
    pub fn large_allocated_bytes(&self) -> usize {
        self.large_allocated.load(Ordering::Relaxed)
    }

    /// Allocate at least `size` bytes
    #[inline]
    pub fn allocate(&self, size: usize) -> PoolResult<NonNull<u8>> {
        self.allocate_in(self.table.classify(size), size, LARGE_ALIGN)
    }

    /// Allocate a block that satisfies `layout`
    #[inline]
    pub fn allocate_layout(&self, layout: Layout) -> PoolResult<NonNull<u8>> {
        let class = self.table.classify_aligned(layout.size(), layout.align());
        self.allocate_in(class, layout.size(), layout.align().max(LARGE_ALIGN))
    }

    #[inline]
    fn allocate_in(&self, class: SizeClass, size: usize, align: usize) -> PoolResult<NonNull<u8>> {
        match class {
            SizeClass::Small(index) => self.small[index].alloc(),
            SizeClass::Large(index) => match self.large[index].pop() {
                Some(block) => Ok(block.as_non_null()),
                None => self.allocate_raw(self.table.large_sizes()[index], LARGE_ALIGN),
            },
            SizeClass::Oversized => self.allocate_raw(size, align),
        }
    }

    #[cold]
    fn allocate_raw(&self, size: usize, align: usize) -> PoolResult<NonNull<u8>> {
        let layout = raw_layout(size, align)?;
        // SAFETY: layout size is at least one byte
        let ptr = NonNull::new(unsafe { alloc(layout) })
            .ok_or_else(|| PoolError::out_of_memory(layout))?;
        self.large_allocated.fetch_add(layout.size(), Ordering::Relaxed);
        trace!(size = layout.size(), align, "system allocation");
        Ok(ptr)
    }

    /// Return a block of `size` bytes
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`allocate`](Self::allocate) on this pool with
    /// the same `size`, and must not be returned twice.
    #[inline]
    pub unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize) {
        self.deallocate_in(self.table.classify(size), ptr, size, LARGE_ALIGN)
    }

    /// Return a block allocated with `layout`
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`allocate_layout`](Self::allocate_layout) on
    /// this pool with the same layout, and must not be returned twice.
    #[inline]
    pub unsafe fn deallocate_layout(&self, ptr: NonNull<u8>, layout: Layout) {
        let class = self.table.classify_aligned(layout.size(), layout.align());
        self.deallocate_in(class, ptr, layout.size(), layout.align().max(LARGE_ALIGN))
    }

    #[inline]
    unsafe fn deallocate_in(&self, class: SizeClass, ptr: NonNull<u8>, size: usize, align: usize) {
        match class {
            SizeClass::Small(index) => self.small[index].free(ptr),
            SizeClass::Large(index) => self.large[index].push(BlockPtr::new(ptr)),
            SizeClass::Oversized => self.release_raw(ptr, size, align),
        }
    }

    unsafe fn release_raw(&self, ptr: NonNull<u8>, size: usize, align: usize) {
        match raw_layout(size, align) {
            Ok(layout) => {
                dealloc(ptr.as_ptr(), layout);
                self.large_allocated.fetch_sub(layout.size(), Ordering::Relaxed);
            }
            // Unreachable for pointers this pool handed out
            Err(err) => warn!(%err, "ignoring release of unrepresentable block"),
        }
    }

    /// Pre-fault `bytes` of large-block memory
    ///
    /// Allocates `bytes / 1MB` one-megabyte blocks in parallel, touches every
    /// page of each, then returns them to the pool so they stay pooled. On
    /// failure every block obtained so far is returned before the error is
    /// reported.
    pub fn reserve(&self, bytes: usize) -> PoolResult<()> {
        let count = bytes / RESERVE_BLOCK_SIZE;
        if count == 0 {
            return Ok(());
        }

        let span = span_operation("pool_reserve");
        let _guard = span.enter();
        span.record_bytes(count * RESERVE_BLOCK_SIZE);

        let results: Vec<PoolResult<BlockPtr>> = (0..count)
            .into_par_iter()
            .map(|_| self.allocate(RESERVE_BLOCK_SIZE).map(BlockPtr::new))
            .collect();

        let mut blocks = Vec::with_capacity(count);
        let mut failure = None;
        for result in results {
            match result {
                Ok(block) => blocks.push(block),
                Err(err) => failure = failure.or(Some(err)),
            }
        }

        if failure.is_none() {
            blocks.par_iter().for_each(|&block| {
                // SAFETY: each block is owned by exactly one task here
                unsafe { prefault(block, RESERVE_BLOCK_SIZE) }
            });
        }

        for block in blocks {
            // SAFETY: allocated above with the same size
            unsafe { self.deallocate(block.as_non_null(), RESERVE_BLOCK_SIZE) };
        }

        match failure {
            Some(err) => {
                span.record_error(&err);
                warn!(bytes, %err, "reserve failed");
                Err(err)
            }
            None => {
                span.record_result(true);
                info!(bytes, blocks = count, "reserved pool memory");
                Ok(())
            }
        }
    }

    /// Return every pooled large block to the system
    ///
    /// Slab caches are left alone. Returns the number of bytes released.
    pub fn clear(&self) -> usize {
        let mut released = 0;
        for (bucket, &size) in self.large.iter().zip(self.table.large_sizes()) {
            let Ok(layout) = raw_layout(size, LARGE_ALIGN) else {
                continue;
            };
            while let Some(block) = bucket.pop() {
                // SAFETY: pooled large blocks were allocated with this layout
                unsafe { dealloc(block.as_ptr(), layout) };
                self.large_allocated.fetch_sub(layout.size(), Ordering::Relaxed);
                released += layout.size();
            }
        }
        if released > 0 {
            debug!(released, "released pooled large blocks");
        }
        released
    }

    pub fn stats(&self) -> PoolStats {
        let small: Vec<BucketStats> = self
            .small
            .iter()
            .map(|slab| BucketStats {
                size: slab.block_size(),
                allocated_blocks: slab.num_allocated_blocks(),
                used_blocks: slab.num_used_blocks(),
            })
            .collect();
        let large = self
            .large
            .iter()
            .zip(self.table.large_sizes())
            .map(|(bucket, &size)| LargeBucketStats {
                size,
                pooled_blocks: bucket.size(),
            })
            .collect();

        let large_allocated_bytes = self.large_allocated_bytes();
        let small_allocated: usize = small.iter().map(BucketStats::allocated_bytes).sum();
        let total_used_bytes = small.iter().map(BucketStats::used_bytes).sum();

        PoolStats {
            small,
            large,
            large_allocated_bytes,
            total_allocated_bytes: small_allocated + large_allocated_bytes,
            total_used_bytes,
        }
    }

    /// Print occupancy of every class to stdout
    pub fn print_stats(&self) {
        print!("{}", self.stats());
    }
}

impl<S: SlabCache> Drop for PoolAllocator<S> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<S: SlabCache> fmt::Debug for PoolAllocator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolAllocator")
            .field("sizes", &self.table.sizes())
            .field("num_small", &self.table.num_small())
            .field("large_allocated_bytes", &self.large_allocated_bytes())
            .finish()
    }
}
