/*!
 * Default Pool
 *
 * Process-wide [`PoolAllocator`] used by `TypedAllocator::default()`.
 * Install one explicitly at start-up with [`install_default`]; otherwise the
 * first call to [`default_allocator`] builds one over
 * [`default_sizes`](super::default_sizes).
 */

use super::pool::PoolAllocator;
use std::sync::OnceLock;
use tracing::info;

static DEFAULT_POOL: OnceLock<PoolAllocator> = OnceLock::new();

/// Install `pool` as the process-wide default
///
/// Hands the pool back if a default already exists.
pub fn install_default(pool: PoolAllocator) -> Result<&'static PoolAllocator, PoolAllocator> {
    DEFAULT_POOL.set(pool)?;
    info!("installed default pool allocator");
    Ok(default_allocator())
}

/// The process-wide default pool
pub fn default_allocator() -> &'static PoolAllocator {
    DEFAULT_POOL.get_or_init(|| {
        info!("building default pool allocator from system memory");
        PoolAllocator::with_default_sizes()
    })
}

/// Whether a default pool exists yet
pub fn is_default_installed() -> bool {
    DEFAULT_POOL.get().is_some()
}
