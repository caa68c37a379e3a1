/*!
 * Bucket Selection Tests
 * Routing of request sizes to small, large and oversized paths
 */

use parpool::{PoolAllocator, PoolError, SizeClass};
use pretty_assertions::assert_eq;

fn pool() -> PoolAllocator {
    PoolAllocator::new(vec![16, 32, 64, 1 << 20, 1 << 21]).unwrap()
}

#[test]
fn test_small_request_uses_next_small_class() {
    let pool = pool();
    assert_eq!(pool.num_small_classes(), 3);
    assert_eq!(pool.classify(20), SizeClass::Small(1));

    let block = pool.allocate(20).unwrap();
    assert_eq!(pool.slab(1).unwrap().num_used_blocks(), 1);
    assert_eq!(pool.slab(0).unwrap().num_used_blocks(), 0);
    unsafe { pool.deallocate(block, 20) };
    assert_eq!(pool.slab(1).unwrap().num_used_blocks(), 0);
}

#[test]
fn test_request_above_small_uses_first_large_class() {
    let pool = pool();
    assert_eq!(pool.classify(70), SizeClass::Large(0));

    let block = pool.allocate(70).unwrap();
    assert_eq!(pool.large_allocated_bytes(), 1 << 20);
    unsafe { pool.deallocate(block, 70) };
    assert_eq!(pool.stats().large[0].pooled_blocks, 1);
}

#[test]
fn test_request_above_largest_is_oversized() {
    let pool = pool();
    let size = (1 << 21) + 1;
    assert_eq!(pool.classify(size), SizeClass::Oversized);

    let block = pool.allocate(size).unwrap();
    assert_eq!(block.as_ptr() as usize % 64, 0);
    assert!(pool.large_allocated_bytes() >= size);

    unsafe { pool.deallocate(block, size) };
    assert_eq!(pool.large_allocated_bytes(), 0);
    assert!(pool.stats().large.iter().all(|b| b.pooled_blocks == 0));
}

#[test]
fn test_exact_class_sizes() {
    let pool = pool();
    assert_eq!(pool.classify(16), SizeClass::Small(0));
    assert_eq!(pool.classify(64), SizeClass::Small(2));
    assert_eq!(pool.classify(1 << 20), SizeClass::Large(0));
    assert_eq!(pool.classify(1 << 21), SizeClass::Large(1));
}

#[test]
fn test_undersized_first_class_rejected() {
    let err = PoolAllocator::new(vec![4, 8]).unwrap_err();
    assert!(err.is_config_error());
    assert_eq!(err, PoolError::ClassTooSmall { size: 4, minimum: 8 });
}

#[test]
fn test_duplicate_class_rejected() {
    let err = PoolAllocator::new(vec![16, 16]).unwrap_err();
    assert!(err.is_config_error());
    assert!(matches!(err, PoolError::NonIncreasing { index: 1, .. }));
}

#[test]
fn test_empty_table_rejected() {
    assert_eq!(
        PoolAllocator::new(Vec::new()).unwrap_err(),
        PoolError::EmptySizeTable
    );
}

#[test]
fn test_default_sizes_start_at_sixteen() {
    let sizes = parpool::default_sizes();
    assert_eq!(sizes[0], 16);
    assert!(sizes.windows(2).all(|pair| pair[1] == pair[0] * 2));
    assert!(*sizes.last().unwrap() >= 1 << 20);
}
