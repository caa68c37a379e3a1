/*!
 * Type Allocator
 *
 * One static [`BlockAllocator`] per type, sized and aligned for `T`.
 * Caches live for the rest of the process and are shared by every caller
 * naming the same type.
 */

use super::slab::BlockAllocator;
use crate::core::errors::PoolResult;
use crate::core::limits::{round_up, MIN_CLASS_SIZE};
use ahash::RandomState;
use dashmap::DashMap;
use std::any::TypeId;
use std::marker::PhantomData;
use std::mem::{align_of, size_of};
use std::ptr::NonNull;
use std::sync::LazyLock;

static REGISTRY: LazyLock<DashMap<TypeId, &'static BlockAllocator, RandomState>> =
    LazyLock::new(|| DashMap::with_hasher(RandomState::new()));

pub struct TypeAllocator<T>(PhantomData<fn() -> T>);

impl<T: 'static> TypeAllocator<T> {
    /// Bytes per block: `size_of::<T>()`, at least 8, rounded to the alignment
    pub const BLOCK_SIZE: usize = round_up(
        if size_of::<T>() > MIN_CLASS_SIZE {
            size_of::<T>()
        } else {
            MIN_CLASS_SIZE
        },
        align_of::<T>(),
    );

    /// Cache shared by every `TypeAllocator<T>`
    pub fn slab() -> &'static BlockAllocator {
        let id = TypeId::of::<T>();
        if let Some(slab) = REGISTRY.get(&id) {
            return *slab;
        }
        *REGISTRY.entry(id).or_insert_with(|| {
            Box::leak(Box::new(BlockAllocator::with_align(
                Self::BLOCK_SIZE,
                align_of::<T>(),
            )))
        })
    }

    /// Uninitialized storage for one `T`
    #[inline]
    pub fn alloc() -> PoolResult<NonNull<T>> {
        Self::slab().alloc().map(NonNull::cast)
    }

    /// # Safety
    ///
    /// `ptr` must come from [`alloc`](Self::alloc) for the same `T` and must
    /// not be freed twice. Any value in it is not dropped.
    #[inline]
    pub unsafe fn free(ptr: NonNull<T>) {
        Self::slab().free(ptr.cast())
    }

    /// Make sure at least `blocks` blocks have been carved
    pub fn reserve(blocks: usize) -> PoolResult<()> {
        Self::slab().reserve(blocks)
    }

    /// Return the cache's memory to the system
    ///
    /// # Safety
    ///
    /// No other thread may be allocating `T` blocks during the call.
    pub unsafe fn finish() {
        Self::slab().clear()
    }

    pub fn block_size() -> usize {
        Self::slab().block_size()
    }

    pub fn num_allocated_blocks() -> usize {
        Self::slab().num_allocated_blocks()
    }

    pub fn num_used_blocks() -> usize {
        Self::slab().num_used_blocks()
    }

    pub fn num_used_bytes() -> usize {
        Self::slab().num_used_bytes()
    }

    pub fn print_stats() {
        Self::slab().print_stats()
    }
}
