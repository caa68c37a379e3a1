/*!
 * System Memory Detection
 * Queried once per process to size the default bucket table
 */

use crate::core::limits::FALLBACK_SYSTEM_MEMORY;
use std::sync::OnceLock;
use sysinfo::{MemoryRefreshKind, RefreshKind, System};
use tracing::{debug, warn};

static SYSTEM_MEMORY: OnceLock<u64> = OnceLock::new();

/// Total physical memory in bytes
///
/// Falls back to 4GB when the platform does not report it.
pub fn system_memory() -> u64 {
    *SYSTEM_MEMORY.get_or_init(|| {
        let sys = System::new_with_specifics(
            RefreshKind::nothing().with_memory(MemoryRefreshKind::nothing().with_ram()),
        );
        match sys.total_memory() {
            0 => {
                warn!(
                    fallback = FALLBACK_SYSTEM_MEMORY,
                    "system memory size unavailable, using fallback"
                );
                FALLBACK_SYSTEM_MEMORY
            }
            total => {
                debug!(total, "detected system memory");
                total
            }
        }
    })
}
