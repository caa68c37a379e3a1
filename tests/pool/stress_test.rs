/*!
 * Pool and Stack Stress Tests
 * Randomly interleaved operations from many threads with consistent totals
 */

use parpool::{LockFreeStack, PoolAllocator};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ptr::NonNull;
use std::sync::{Arc, Barrier};
use std::thread;

const THREADS: usize = 32;
const OPS_PER_THREAD: usize = 100_000;

/// Blocks one thread may hold before it is forced to free
const MAX_HELD: usize = 256;

const SMALL_SIZES: [usize; 6] = [8, 16, 24, 100, 500, 4000];
const LARGE_SIZES: [usize; 2] = [1 << 20, (1 << 20) + 1];

#[test]
fn test_pool_random_interleaving() {
    let pool = Arc::new(PoolAllocator::new(vec![16, 32, 128, 512, 4096, 1 << 20, 1 << 21]).unwrap());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let pool = Arc::clone(&pool);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(t as u64);
                let mut held: Vec<(usize, usize, u64)> = Vec::new();
                barrier.wait();

                for op in 0..OPS_PER_THREAD {
                    let allocate = held.is_empty() || (held.len() < MAX_HELD && rng.gen_bool(0.5));
                    if allocate {
                        let size = if rng.gen_ratio(1, 200) {
                            LARGE_SIZES[rng.gen_range(0..LARGE_SIZES.len())]
                        } else {
                            SMALL_SIZES[rng.gen_range(0..SMALL_SIZES.len())]
                        };
                        let block = pool.allocate(size).unwrap();
                        let tag = ((t as u64) << 32) | op as u64;
                        // Blocks are at least 8 bytes and 8-aligned
                        unsafe { block.as_ptr().cast::<u64>().write(tag) };
                        held.push((block.as_ptr() as usize, size, tag));
                    } else {
                        let index = rng.gen_range(0..held.len());
                        let (addr, size, tag) = held.swap_remove(index);
                        let block = NonNull::new(addr as *mut u8).unwrap();
                        unsafe {
                            assert_eq!(block.as_ptr().cast::<u64>().read(), tag, "block shared");
                            pool.deallocate(block, size);
                        }
                    }
                }

                for (addr, size, tag) in held {
                    let block = NonNull::new(addr as *mut u8).unwrap();
                    unsafe {
                        assert_eq!(block.as_ptr().cast::<u64>().read(), tag, "block shared");
                        pool.deallocate(block, size);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let stats = pool.stats();
    assert_eq!(stats.total_used_bytes, 0);
    assert!(stats.small.iter().all(|bucket| bucket.used_blocks == 0));

    // Every large byte obtained from the system now sits in a free list
    let pooled: usize = stats
        .large
        .iter()
        .map(|bucket| bucket.size * bucket.pooled_blocks)
        .sum();
    assert_eq!(stats.large_allocated_bytes, pooled);

    pool.clear();
    assert_eq!(pool.large_allocated_bytes(), 0);
}

#[test]
fn test_stack_random_interleaving() {
    let stack = Arc::new(LockFreeStack::new());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let stack = Arc::clone(&stack);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(1000 + t as u64);
                let mut pushed = Vec::new();
                let mut popped = Vec::new();
                barrier.wait();
                for i in 0..OPS_PER_THREAD {
                    if rng.gen_bool(0.5) {
                        let value = t * OPS_PER_THREAD + i;
                        stack.push(value);
                        pushed.push(value);
                    } else if let Some(value) = stack.pop() {
                        popped.push(value);
                    }
                }
                (pushed, popped)
            })
        })
        .collect();

    let mut pushed = Vec::new();
    let mut popped = Vec::new();
    for handle in handles {
        let (p, q) = handle.join().unwrap();
        pushed.extend(p);
        popped.extend(q);
    }

    assert_eq!(stack.size(), pushed.len() - popped.len());

    while let Some(value) = stack.pop() {
        popped.push(value);
    }
    assert_eq!(stack.recycled(), stack.capacity());

    // Every pushed value comes back exactly once
    pushed.sort_unstable();
    popped.sort_unstable();
    let before = popped.len();
    popped.dedup();
    assert_eq!(popped.len(), before, "a value was popped twice");
    assert_eq!(popped, pushed);
}
