/*!
 * Typed Allocator
 *
 * Element-count view of a [`PoolAllocator`] for container-style callers.
 * Adapters are `Copy` handles; all adapters over the same pool compare
 * equal whatever their element type.
 */

use super::global::default_allocator;
use super::pool::PoolAllocator;
use crate::core::errors::{PoolError, PoolResult};
use crate::core::hints::unlikely;
use std::alloc::Layout;
use std::fmt;
use std::marker::PhantomData;
use std::mem::{align_of, size_of};
use std::ptr::{self, NonNull};

pub struct TypedAllocator<'a, T> {
    pool: &'a PoolAllocator,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T> TypedAllocator<'a, T> {
    #[inline]
    pub fn new(pool: &'a PoolAllocator) -> Self {
        Self {
            pool,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn pool(&self) -> &'a PoolAllocator {
        self.pool
    }

    /// Layout of `count` contiguous elements
    pub fn layout_for(count: usize) -> PoolResult<Layout> {
        Layout::array::<T>(count).map_err(|_| PoolError::InvalidLayout {
            count,
            elem_size: size_of::<T>(),
            align: align_of::<T>(),
        })
    }

    /// Allocate room for `count` elements
    ///
    /// Zero-sized requests return a dangling, well-aligned pointer without
    /// touching the pool.
    #[inline]
    pub fn allocate(&self, count: usize) -> PoolResult<NonNull<T>> {
        let layout = Self::layout_for(count)?;
        if unlikely(layout.size() == 0) {
            return Ok(NonNull::dangling());
        }
        self.pool.allocate_layout(layout).map(NonNull::cast)
    }

    /// Return room for `count` elements
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`allocate`](Self::allocate) with the same
    /// `count` on an adapter over the same pool, and must not be returned
    /// twice.
    #[inline]
    pub unsafe fn deallocate(&self, ptr: NonNull<T>, count: usize) {
        let layout = Self::layout_for(count);
        debug_assert!(layout.is_ok(), "no allocation holds {count} elements");
        let Ok(layout) = layout else {
            return;
        };
        if unlikely(layout.size() == 0) {
            return;
        }
        self.pool.deallocate_layout(ptr.cast(), layout)
    }

    /// Same pool, different element type
    #[inline]
    pub fn rebind<U>(&self) -> TypedAllocator<'a, U> {
        TypedAllocator::new(self.pool)
    }
}

impl<T> Default for TypedAllocator<'static, T> {
    fn default() -> Self {
        Self::new(default_allocator())
    }
}

impl<T> Clone for TypedAllocator<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TypedAllocator<'_, T> {}

impl<'b, T, U> PartialEq<TypedAllocator<'b, U>> for TypedAllocator<'_, T> {
    fn eq(&self, other: &TypedAllocator<'b, U>) -> bool {
        ptr::eq(self.pool, other.pool)
    }
}

impl<T> Eq for TypedAllocator<'_, T> {}

impl<T> fmt::Debug for TypedAllocator<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedAllocator")
            .field("element", &std::any::type_name::<T>())
            .field("pool", &(self.pool as *const PoolAllocator))
            .finish()
    }
}
