/*!
 * Compiler Optimization Hints
 * Branch prediction hints for the allocation hot paths
 */

/// Hint to the compiler that this branch is unlikely to be taken
///
/// # Implementation
/// On nightly with core_intrinsics, uses LLVM's `llvm.expect` intrinsic.
/// On stable, returns the value unchanged.
#[inline(always)]
#[must_use]
pub fn unlikely(b: bool) -> bool {
    #[cfg(feature = "nightly")]
    {
        unsafe { core::intrinsics::unlikely(b) }
    }
    #[cfg(not(feature = "nightly"))]
    {
        b
    }
}
