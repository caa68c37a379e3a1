/*!
 * Lock-Free Synchronization Primitives
 *
 * ABA-safe building blocks for the allocator:
 * - Slot arena with stable, index-addressed nodes
 * - Primitive tagged stack (single-word CAS on slot index + generation)
 * - Lock-free stack of arbitrary values with node recycling
 */

mod arena;
mod prim;
mod stack;

// Re-export public API
pub use stack::LockFreeStack;
