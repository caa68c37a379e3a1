/*!
 * Parpool Library
 * Lock-free stack and size-class pool allocator for parallel workloads
 *
 * - [`LockFreeStack`]: ABA-safe, linearizable stack of arbitrary values
 * - [`PoolAllocator`]: small classes in slab caches, large classes in
 *   lock-free free lists, oversized requests straight to the system
 * - [`TypedAllocator`] / [`TypeAllocator`]: element-typed adapters
 */

#![cfg_attr(feature = "nightly", feature(core_intrinsics))]
#![cfg_attr(feature = "nightly", allow(internal_features))]

pub mod core;
pub mod memory;
pub mod monitoring;

// Re-exports
pub use crate::core::errors::{PoolError, PoolResult};
pub use crate::core::sync::LockFreeStack;
pub use crate::core::types::BlockPtr;
pub use memory::{
    default_allocator, default_sizes, install_default, BlockAllocator, PoolAllocator, PoolConfig,
    PoolStats, SizeClass, SizeClassTable, SlabCache, TypeAllocator, TypedAllocator,
};
pub use monitoring::init_tracing;
