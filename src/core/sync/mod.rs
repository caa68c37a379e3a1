/*!
 * Synchronization Primitives
 * Tagged heads and lock-free containers used by the allocator
 */

pub mod lockfree;
pub(crate) mod tagged;

pub use lockfree::LockFreeStack;
