/*!
 * Core Module
 * Fundamental types, limits, error handling and lock-free primitives
 */

pub mod errors;
pub mod hints;
pub mod limits;
pub mod sync;
pub mod types;

// Re-export for convenience
pub use errors::*;
pub use hints::*;
pub use types::*;
