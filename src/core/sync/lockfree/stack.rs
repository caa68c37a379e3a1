/*!
 * Lock-Free Stack
 *
 * Linearizable, unbounded, lock-free stack for values of any type.
 *
 * ## Design
 *
 * Two primitive tagged stacks share one slot arena:
 * - **live**: slots currently holding a value
 * - **free**: vacated slots waiting to be reused
 *
 * ```text
 * push(v): slot = free.pop() or arena.fresh(); write v; live.push(slot)
 * pop():   slot = live.pop()?; read v; free.push(slot); v
 * ```
 *
 * Memory is bounded by the largest size the stack has ever reached. Node
 * memory is never handed back to a general-purpose allocator while the stack
 * is shared, which keeps it safe to use underneath the pool allocator itself.
 *
 * ## Progress
 *
 * Lock-free, not wait-free: a CAS only fails because another operation
 * succeeded, so the system as a whole always makes progress.
 */

use super::arena::SlotArena;
use super::prim::PrimStack;
use crate::core::errors::{fatal, PoolResult};
use crossbeam_utils::CachePadded;
use std::fmt;

pub struct LockFreeStack<T> {
    live: CachePadded<PrimStack>,
    free: CachePadded<PrimStack>,
    arena: SlotArena<T>,
}

// SAFETY: values move between threads through push/pop but are never shared;
// a slot's value is only touched by the thread that owns the slot.
unsafe impl<T: Send> Send for LockFreeStack<T> {}
unsafe impl<T: Send> Sync for LockFreeStack<T> {}

impl<T> LockFreeStack<T> {
    /// Create an empty stack; no memory is allocated until the first push
    pub fn new() -> Self {
        Self {
            live: CachePadded::new(PrimStack::new()),
            free: CachePadded::new(PrimStack::new()),
            arena: SlotArena::new(),
        }
    }

    /// Create a stack with `nodes` recycled nodes ready for use
    pub fn with_capacity(nodes: usize) -> PoolResult<Self> {
        let stack = Self::new();
        stack.reserve(nodes)?;
        Ok(stack)
    }

    /// Push a value
    ///
    /// Aborts through the allocation-error handler if a node is needed and
    /// the system cannot provide one.
    #[inline]
    pub fn push(&self, value: T) {
        if let Err(err) = self.try_push(value) {
            fatal(err);
        }
    }

    /// Push a value, reporting node-allocation failure to the caller
    ///
    /// On error the value is dropped and the stack is unchanged.
    pub fn try_push(&self, value: T) -> PoolResult<()> {
        let id = match self.free.pop(&self.arena) {
            Some(id) => id,
            None => self.arena.fresh()?,
        };

        // SAFETY: the slot came off the free stack or is brand new, so this
        // thread owns it and it holds no value.
        unsafe { self.arena.slot(id).write(value) };
        self.live.push(&self.arena, id);
        Ok(())
    }

    /// Pop the most recently pushed value, `None` if the stack was empty
    pub fn pop(&self) -> Option<T> {
        let id = self.live.pop(&self.arena)?;

        // SAFETY: the slot was just unlinked from the live stack, so this
        // thread owns it and it holds the value written by its pusher.
        let value = unsafe { self.arena.slot(id).take() };
        self.free.push(&self.arena, id);
        Some(value)
    }

    /// Number of stored values at the moment of the call
    ///
    /// Best-effort snapshot; concurrent pushes and pops make it stale
    /// immediately.
    #[inline]
    pub fn size(&self) -> usize {
        self.live.len(&self.arena)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.size()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Number of vacated nodes waiting for reuse
    #[inline]
    pub fn recycled(&self) -> usize {
        self.free.len(&self.arena)
    }

    /// Number of nodes created so far (high-water mark of the stack size)
    #[inline]
    pub fn capacity(&self) -> usize {
        self.arena.created()
    }

    /// Make sure at least `nodes` nodes exist, so that pushing up to that
    /// many values does not allocate
    pub fn reserve(&self, nodes: usize) -> PoolResult<()> {
        while self.arena.created() < nodes {
            let id = self.arena.fresh()?;
            self.free.push(&self.arena, id);
        }
        Ok(())
    }

    /// Drop every stored value and return all node memory to the system
    ///
    /// Requires exclusive access, so no push or pop can be in flight.
    pub fn clear(&mut self) {
        while let Some(id) = self.live.pop(&self.arena) {
            // SAFETY: exclusive access; every live slot holds a value.
            drop(unsafe { self.arena.slot(id).take() });
        }
        self.live.reset();
        self.free.reset();
        self.arena.release();
    }
}

impl<T> Default for LockFreeStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for LockFreeStack<T> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T> fmt::Debug for LockFreeStack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockFreeStack")
            .field("size", &self.size())
            .field("recycled", &self.recycled())
            .field("capacity", &self.capacity())
            .finish()
    }
}
