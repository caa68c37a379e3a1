/*!
 * Memory Module
 * Size-class pool allocator, slab caches and typed adapters
 */

pub mod adapter;
pub mod config;
pub mod global;
pub mod pool;
pub mod size_class;
pub mod slab;
pub mod stats;
pub mod system;
pub mod traits;
pub mod type_allocator;

// Re-export for convenience
pub use adapter::TypedAllocator;
pub use config::PoolConfig;
pub use global::{default_allocator, install_default, is_default_installed};
pub use pool::PoolAllocator;
pub use size_class::{default_sizes, SizeClass, SizeClassTable};
pub use slab::BlockAllocator;
pub use stats::{BucketStats, LargeBucketStats, PoolStats};
pub use system::system_memory;
pub use traits::SlabCache;
pub use type_allocator::TypeAllocator;
