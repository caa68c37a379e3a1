/*!
 * Error Types
 * Centralized error handling with thiserror and miette
 */

use miette::Diagnostic;
use std::alloc::Layout;
use thiserror::Error;

/// Pool operation result
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors raised by the stack, the slab caches and the pool allocator
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum PoolError {
    #[error("Size-class table is empty")]
    #[diagnostic(
        code(pool::empty_size_table),
        help("Provide at least one bucket size, e.g. powers of two from 16 bytes.")
    )]
    EmptySizeTable,

    #[error("Size class of {size} bytes is below the minimum of {minimum} bytes")]
    #[diagnostic(
        code(pool::class_too_small),
        help("Every small bucket must be able to hold a free-list link.")
    )]
    ClassTooSmall { size: usize, minimum: usize },

    #[error("Size classes must strictly increase: class {index} is {size} bytes after {previous} bytes")]
    #[diagnostic(
        code(pool::non_increasing),
        help("Sort the bucket sizes and remove duplicates.")
    )]
    NonIncreasing {
        index: usize,
        previous: usize,
        size: usize,
    },

    #[error("Invalid pool configuration: {0}")]
    #[diagnostic(
        code(pool::invalid_config),
        help("Check PARPOOL_SIZE_CLASSES, PARPOOL_MAX_CLASS_LOG2 and PARPOOL_RESERVE_BYTES.")
    )]
    InvalidConfig(String),

    #[error("Out of memory: failed to allocate {size} bytes aligned to {align}")]
    #[diagnostic(
        code(pool::out_of_memory),
        help("The system allocator refused the request. Free pooled memory with clear().")
    )]
    OutOfMemory { size: usize, align: usize },

    #[error("Lock-free stack node capacity of {capacity} exceeded")]
    #[diagnostic(
        code(pool::stack_capacity_exceeded),
        help("Node indices are 32 bits wide; the stack cannot grow further.")
    )]
    StackCapacityExceeded { capacity: usize },

    #[error("Invalid layout: {count} elements of {elem_size} bytes aligned to {align}")]
    #[diagnostic(
        code(pool::invalid_layout),
        help("The element count overflows the address space.")
    )]
    InvalidLayout {
        count: usize,
        elem_size: usize,
        align: usize,
    },
}

impl PoolError {
    /// Out-of-memory error for a failed raw allocation
    #[inline]
    pub fn out_of_memory(layout: Layout) -> Self {
        PoolError::OutOfMemory {
            size: layout.size(),
            align: layout.align(),
        }
    }

    /// Whether this error belongs to the configuration taxonomy
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            PoolError::EmptySizeTable
                | PoolError::ClassTooSmall { .. }
                | PoolError::NonIncreasing { .. }
                | PoolError::InvalidConfig(_)
        )
    }

    /// Whether this error belongs to the out-of-memory taxonomy
    pub fn is_out_of_memory(&self) -> bool {
        matches!(
            self,
            PoolError::OutOfMemory { .. } | PoolError::StackCapacityExceeded { .. }
        )
    }
}

/// Abort on an out-of-memory condition that the caller cannot observe
///
/// Routes through the standard allocation-error handler so that the process
/// reports the failing layout the same way the global allocator would.
#[cold]
#[inline(never)]
pub(crate) fn fatal(err: PoolError) -> ! {
    tracing::error!(error = %err, "fatal allocation failure");
    if let PoolError::OutOfMemory { size, align } = err {
        if let Ok(layout) = Layout::from_size_align(size, align) {
            std::alloc::handle_alloc_error(layout);
        }
    }
    panic!("{err}")
}
