/*!
 * Parpool - Diagnostic Entry Point
 *
 * Builds the default pool from the environment, runs a short parallel
 * workload through it and prints the resulting occupancy.
 *
 * Environment:
 * - PARPOOL_SIZE_CLASSES / PARPOOL_MAX_CLASS_LOG2 / PARPOOL_RESERVE_BYTES
 * - PARPOOL_STATS_JSON: print stats as JSON instead of text
 */

use miette::{miette, IntoDiagnostic, Result};
use parpool::monitoring::span_operation;
use parpool::{init_tracing, install_default, PoolAllocator, PoolConfig, TypedAllocator};
use rayon::prelude::*;
use tracing::info;

#[cfg(all(feature = "jemalloc", not(target_env = "msvc")))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

const WORKLOAD_ROUNDS: usize = 10_000;

fn main() -> Result<()> {
    init_tracing();

    let config = PoolConfig::from_env()?;
    info!(
        classes = config.sizes.len(),
        smallest = config.sizes.first().copied().unwrap_or(0),
        largest = config.sizes.last().copied().unwrap_or(0),
        reserve_bytes = config.reserve_bytes,
        "pool configuration loaded"
    );

    let pool = PoolAllocator::from_config(&config)?;
    let pool = install_default(pool).map_err(|_| miette!("default pool already installed"))?;

    run_workload(pool)?;

    let stats = pool.stats();
    if std::env::var("PARPOOL_STATS_JSON").is_ok_and(|v| v == "1" || v == "true") {
        println!("{}", stats.to_json().into_diagnostic()?);
    } else {
        print!("{stats}");
    }
    Ok(())
}

/// Allocate and release a spread of sizes from every rayon worker
fn run_workload(pool: &'static PoolAllocator) -> Result<()> {
    let span = span_operation("workload");
    let _guard = span.enter();

    let large = pool.table().large_sizes().first().copied();
    (0..WORKLOAD_ROUNDS).into_par_iter().try_for_each(|round| {
        let words = TypedAllocator::<u64>::new(pool);
        let count = 1 << (round % 12);
        let ptr = words.allocate(count)?;
        // SAFETY: freshly allocated room for `count` u64 values
        unsafe {
            ptr.as_ptr().write(round as u64);
            words.deallocate(ptr, count);
        }

        if let Some(size) = large.filter(|_| round % 1000 == 0) {
            let block = pool.allocate(size)?;
            // SAFETY: allocated above with the same size
            unsafe { pool.deallocate(block, size) };
        }
        Ok::<_, parpool::PoolError>(())
    })?;

    span.record_result(true);
    info!(rounds = WORKLOAD_ROUNDS, "workload finished");
    Ok(())
}
