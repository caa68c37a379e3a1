/*!
 * Pool Allocator Tests
 * Block reuse, reservation, clearing, statistics and custom slab caches
 */

use parpool::{PoolAllocator, PoolConfig, PoolResult, SizeClassTable, SlabCache};
use pretty_assertions::assert_eq;
use std::alloc::Layout;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

fn pool() -> PoolAllocator {
    PoolAllocator::new(vec![16, 32, 64, 128, 1 << 20, 1 << 21]).unwrap()
}

#[test]
fn test_round_trip_returns_same_block() {
    let pool = pool();
    for size in [8, 100, 1 << 20] {
        let first = pool.allocate(size).unwrap();
        unsafe { pool.deallocate(first, size) };
        let second = pool.allocate(size).unwrap();
        assert_eq!(first, second, "size {size} did not reuse its block");
        unsafe { pool.deallocate(second, size) };
    }
}

#[test]
fn test_blocks_are_writable() {
    let pool = pool();
    let size = 100;
    let block = pool.allocate(size).unwrap();
    unsafe {
        std::ptr::write_bytes(block.as_ptr(), 0xAB, size);
        assert_eq!(*block.as_ptr().add(size - 1), 0xAB);
        pool.deallocate(block, size);
    }
}

#[test]
fn test_reserve_prefaults_and_pools() {
    let pool = pool();
    pool.reserve(3 << 20).unwrap();
    let stats = pool.stats();
    assert_eq!(stats.large[0].pooled_blocks, 3);
    assert_eq!(stats.large_allocated_bytes, 3 << 20);

    // Reserved blocks satisfy later requests without growing the pool
    let block = pool.allocate(1 << 20).unwrap();
    assert_eq!(pool.large_allocated_bytes(), 3 << 20);
    unsafe { pool.deallocate(block, 1 << 20) };
}

#[test]
fn test_clear_releases_pooled_large_blocks() {
    let pool = pool();
    let blocks: Vec<_> = (0..4).map(|_| pool.allocate(1 << 21).unwrap()).collect();
    assert_eq!(pool.large_allocated_bytes(), 4 << 21);

    for block in blocks {
        unsafe { pool.deallocate(block, 1 << 21) };
    }
    assert_eq!(pool.clear(), 4 << 21);
    assert_eq!(pool.large_allocated_bytes(), 0);
    assert_eq!(pool.stats().large[1].pooled_blocks, 0);
}

#[test]
fn test_clear_keeps_blocks_in_use() {
    let pool = pool();
    let held = pool.allocate(1 << 20).unwrap();
    let pooled = pool.allocate(1 << 20).unwrap();
    unsafe { pool.deallocate(pooled, 1 << 20) };

    assert_eq!(pool.clear(), 1 << 20);
    assert_eq!(pool.large_allocated_bytes(), 1 << 20);
    unsafe { pool.deallocate(held, 1 << 20) };
}

#[test]
fn test_stats_totals() {
    let pool = pool();
    let small: Vec<_> = (0..10).map(|_| pool.allocate(32).unwrap()).collect();
    let large = pool.allocate(1 << 20).unwrap();

    let stats = pool.stats();
    assert_eq!(stats.small[1].used_blocks, 10);
    assert_eq!(stats.total_used_bytes, 320);
    let small_bytes: usize = stats.small.iter().map(|b| b.allocated_bytes()).sum();
    assert_eq!(stats.total_allocated_bytes, small_bytes + (1 << 20));

    let text = stats.to_string();
    assert!(text.contains("size = 32, allocated = "));
    assert!(text.contains("Large allocated = 1048576"));
    assert!(text.contains("Total bytes used = 320"));

    for block in small {
        unsafe { pool.deallocate(block, 32) };
    }
    unsafe { pool.deallocate(large, 1 << 20) };
    pool.print_stats();
}

#[test]
fn test_layout_requests_are_aligned() {
    let pool = PoolAllocator::new(vec![24, 40, 64, 1 << 20]).unwrap();
    for align in [1, 8, 16, 32, 64, 128, 4096] {
        let layout = Layout::from_size_align(24, align).unwrap();
        let block = pool.allocate_layout(layout).unwrap();
        assert_eq!(block.as_ptr() as usize % align, 0, "align {align}");
        unsafe { pool.deallocate_layout(block, layout) };
    }
    assert_eq!(pool.large_allocated_bytes(), 0);
}

#[test]
fn test_from_config() {
    let config = PoolConfig::powers_of_two(4, 20).with_reserve(1 << 20);
    let pool = PoolAllocator::from_config(&config).unwrap();
    assert_eq!(pool.sizes().first(), Some(&16));
    assert_eq!(pool.sizes().last(), Some(&(1 << 20)));
    assert_eq!(pool.stats().large[0].pooled_blocks, 1);

    let bad = PoolConfig::with_sizes(vec![32, 16]);
    assert!(PoolAllocator::from_config(&bad).unwrap_err().is_config_error());
}

/// Slab cache that serves every block from the system allocator and counts
/// calls
struct CountingSlab {
    size: usize,
    allocs: AtomicUsize,
    frees: AtomicUsize,
}

impl CountingSlab {
    fn layout(&self) -> Layout {
        Layout::from_size_align(self.size, 8).unwrap()
    }
}

impl SlabCache for CountingSlab {
    fn new(block_size: usize) -> Self {
        Self {
            size: block_size,
            allocs: AtomicUsize::new(0),
            frees: AtomicUsize::new(0),
        }
    }

    fn alloc(&self) -> PoolResult<NonNull<u8>> {
        self.allocs.fetch_add(1, Ordering::Relaxed);
        Ok(NonNull::new(unsafe { std::alloc::alloc(self.layout()) }).unwrap())
    }

    unsafe fn free(&self, ptr: NonNull<u8>) {
        self.frees.fetch_add(1, Ordering::Relaxed);
        std::alloc::dealloc(ptr.as_ptr(), self.layout());
    }

    fn reserve(&self, _blocks: usize) -> PoolResult<()> {
        Ok(())
    }

    unsafe fn clear(&self) {}

    fn block_size(&self) -> usize {
        self.size
    }

    fn num_allocated_blocks(&self) -> usize {
        self.allocs.load(Ordering::Relaxed)
    }

    fn num_used_blocks(&self) -> usize {
        self.allocs.load(Ordering::Relaxed) - self.frees.load(Ordering::Relaxed)
    }
}

#[test]
fn test_small_classes_delegate_to_slab_cache() {
    let table = SizeClassTable::new(vec![16, 64, 1 << 20]).unwrap();
    let pool: PoolAllocator<CountingSlab> = PoolAllocator::from_table(table);

    let a = pool.allocate(10).unwrap();
    let b = pool.allocate(50).unwrap();
    unsafe { pool.deallocate(a, 10) };

    let first = pool.slab(0).unwrap();
    let second = pool.slab(1).unwrap();
    assert_eq!(first.allocs.load(Ordering::Relaxed), 1);
    assert_eq!(first.frees.load(Ordering::Relaxed), 1);
    assert_eq!(second.num_used_blocks(), 1);
    assert_eq!(pool.stats().total_used_bytes, 64);

    unsafe { pool.deallocate(b, 50) };
}
