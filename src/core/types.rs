/*!
 * Core Types
 * Common types used across the allocator
 */

use std::fmt;
use std::ptr::NonNull;

/// Raw block handed out by a slab cache or the pool
///
/// Ownership of the pointed-to memory travels with the value, so it may move
/// between threads through the lock-free free lists.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct BlockPtr(NonNull<u8>);

// SAFETY: a BlockPtr is an exclusive handle to an unshared block of raw bytes.
unsafe impl Send for BlockPtr {}
unsafe impl Sync for BlockPtr {}

impl BlockPtr {
    #[inline(always)]
    pub fn new(ptr: NonNull<u8>) -> Self {
        Self(ptr)
    }

    #[inline(always)]
    pub fn as_non_null(self) -> NonNull<u8> {
        self.0
    }

    #[inline(always)]
    pub fn as_ptr(self) -> *mut u8 {
        self.0.as_ptr()
    }
}

impl fmt::Debug for BlockPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockPtr({:p})", self.0)
    }
}
