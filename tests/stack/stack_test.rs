/*!
 * Lock-Free Stack Tests
 * Sequential behaviour: ordering, size tracking, value ownership
 */

use parpool::LockFreeStack;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts how many instances have been dropped
struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_pop_returns_pushed_values_in_reverse() {
    let stack = LockFreeStack::new();
    for value in ["a", "b", "c"] {
        stack.push(value.to_string());
    }

    assert_eq!(stack.pop().as_deref(), Some("c"));
    assert_eq!(stack.pop().as_deref(), Some("b"));
    assert_eq!(stack.pop().as_deref(), Some("a"));
    assert_eq!(stack.pop(), None);
}

#[test]
fn test_pop_on_empty_stack() {
    let stack: LockFreeStack<u64> = LockFreeStack::new();
    assert_eq!(stack.pop(), None);
    assert!(stack.is_empty());
    assert_eq!(stack.size(), 0);
}

#[test]
fn test_size_tracks_pushes_minus_pops() {
    let stack = LockFreeStack::new();
    for i in 0..100 {
        stack.push(i);
        assert_eq!(stack.size(), i + 1);
    }
    for i in (0..40).rev() {
        stack.pop();
        assert_eq!(stack.size(), 60 + i);
    }
    assert_eq!(stack.len(), 60);
}

#[test]
fn test_push_after_pop_reuses_node() {
    let stack = LockFreeStack::new();
    stack.push(1u32);
    stack.pop();
    stack.push(2u32);

    assert_eq!(stack.capacity(), 1);
    assert_eq!(stack.pop(), Some(2));
}

#[test]
fn test_popped_values_are_not_dropped_twice() {
    let drops = Arc::new(AtomicUsize::new(0));
    let stack = LockFreeStack::new();

    for _ in 0..10 {
        stack.push(DropCounter(Arc::clone(&drops)));
    }
    for _ in 0..10 {
        drop(stack.pop());
    }
    assert_eq!(drops.load(Ordering::SeqCst), 10);

    // Recycled nodes hold no value, so refilling and dropping the stack
    // drops exactly the new values
    for _ in 0..5 {
        stack.push(DropCounter(Arc::clone(&drops)));
    }
    drop(stack);
    assert_eq!(drops.load(Ordering::SeqCst), 15);
}

#[test]
fn test_clear_drops_stored_values() {
    let drops = Arc::new(AtomicUsize::new(0));
    let mut stack = LockFreeStack::new();
    for _ in 0..7 {
        stack.push(DropCounter(Arc::clone(&drops)));
    }

    stack.clear();
    assert_eq!(drops.load(Ordering::SeqCst), 7);
    assert!(stack.is_empty());
    assert_eq!(stack.size(), 0);
}

#[test]
fn test_reserve_avoids_growth() {
    let stack = LockFreeStack::with_capacity(64).unwrap();
    assert_eq!(stack.capacity(), 64);
    for i in 0..64 {
        stack.push(i);
    }
    assert_eq!(stack.capacity(), 64);
    stack.push(64);
    assert_eq!(stack.capacity(), 65);
}

#[test]
fn test_try_push() {
    let stack = LockFreeStack::new();
    stack.try_push(vec![1, 2, 3]).unwrap();
    assert_eq!(stack.pop(), Some(vec![1, 2, 3]));
}

#[test]
fn test_large_stack_spans_segments() {
    let stack = LockFreeStack::new();
    for i in 0..10_000u32 {
        stack.push(i);
    }
    assert_eq!(stack.size(), 10_000);
    for i in (0..10_000u32).rev() {
        assert_eq!(stack.pop(), Some(i));
    }
}
