/*!
 * Slot Arena
 *
 * Backing storage for the nodes of a lock-free stack.
 *
 * Slots are grouped in segments of doubling size (`32 << k` slots for segment
 * `k`), so a slot never moves once created and a 32-bit index addresses it in
 * O(1). Segments are allocated on demand and published with a CAS; nothing is
 * returned to the system until the owning stack is cleared or dropped, which
 * requires exclusive access.
 */

use crate::core::errors::{PoolError, PoolResult};
use crate::core::limits::{ARENA_FIRST_SEGMENT_LOG2, ARENA_SEGMENTS, MAX_STACK_NODES};
use crate::core::sync::tagged::SlotId;
use std::alloc::{alloc, dealloc, Layout};
use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU32, AtomicUsize, Ordering};
use tracing::trace;

/// Storage node: value slot, link to the node below, cached sub-stack length
///
/// `next` and `length` are written only by the thread that owns the node
/// while it links the node in. They are atomics because a delayed reader may
/// still load them after the node moved on; such a reader's CAS then fails on
/// the generation check.
pub(crate) struct Slot<T> {
    value: UnsafeCell<MaybeUninit<T>>,
    pub(crate) next: AtomicU32,
    pub(crate) length: AtomicUsize,
}

impl<T> Slot<T> {
    fn vacant() -> Self {
        Self {
            value: UnsafeCell::new(MaybeUninit::uninit()),
            next: AtomicU32::new(0),
            length: AtomicUsize::new(0),
        }
    }

    /// Store a value into a vacant slot
    ///
    /// # Safety
    /// The caller must own the slot exclusively (popped from a stack or freshly
    /// created) and the slot must not hold a value.
    #[inline(always)]
    pub(crate) unsafe fn write(&self, value: T) {
        (*self.value.get()).write(value);
    }

    /// Move the value out, leaving the slot vacant
    ///
    /// # Safety
    /// The caller must own the slot exclusively and the slot must hold a value.
    #[inline(always)]
    pub(crate) unsafe fn take(&self) -> T {
        (*self.value.get()).assume_init_read()
    }
}

#[inline(always)]
const fn segment_len(segment: usize) -> usize {
    1 << (ARENA_FIRST_SEGMENT_LOG2 as usize + segment)
}

/// Map a slot index to (segment, offset within segment)
#[inline(always)]
fn locate(id: SlotId) -> (usize, usize) {
    let biased = id.index() as usize + segment_len(0);
    let segment = (usize::BITS - 1 - biased.leading_zeros()) as usize
        - ARENA_FIRST_SEGMENT_LOG2 as usize;
    (segment, biased - segment_len(segment))
}

pub(crate) struct SlotArena<T> {
    segments: [AtomicPtr<Slot<T>>; ARENA_SEGMENTS],
    created: AtomicUsize,
    _marker: PhantomData<T>,
}

impl<T> SlotArena<T> {
    pub(crate) fn new() -> Self {
        Self {
            segments: std::array::from_fn(|_| AtomicPtr::new(ptr::null_mut())),
            created: AtomicUsize::new(0),
            _marker: PhantomData,
        }
    }

    /// Number of slots handed out so far
    #[inline]
    pub(crate) fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// Hand out a never-used slot, creating its segment if needed
    pub(crate) fn fresh(&self) -> PoolResult<SlotId> {
        self.fresh_within(MAX_STACK_NODES)
    }

    /// An index is claimed only once its segment exists, so a failed call
    /// leaves `created` untouched.
    fn fresh_within(&self, limit: usize) -> PoolResult<SlotId> {
        let mut index = self.created.load(Ordering::Relaxed);
        loop {
            if index >= limit {
                return Err(PoolError::StackCapacityExceeded { capacity: limit });
            }

            let id = SlotId::new(index as u32);
            let (segment, _) = locate(id);
            self.ensure_segment(segment)?;

            match self.created.compare_exchange_weak(
                index,
                index + 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Ok(id),
                Err(current) => index = current,
            }
        }
    }

    fn ensure_segment(&self, segment: usize) -> PoolResult<()> {
        let entry = &self.segments[segment];
        if !entry.load(Ordering::Acquire).is_null() {
            return Ok(());
        }

        let len = segment_len(segment);
        let layout = Self::segment_layout(segment)?;

        // SAFETY: Slot<T> always has a non-zero size, so the layout does too.
        let raw = unsafe { alloc(layout) }.cast::<Slot<T>>();
        if raw.is_null() {
            return Err(PoolError::out_of_memory(layout));
        }
        for offset in 0..len {
            // SAFETY: `offset < len` stays inside the fresh allocation.
            unsafe { raw.add(offset).write(Slot::vacant()) };
        }

        match entry.compare_exchange(ptr::null_mut(), raw, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => {
                trace!(segment, slots = len, "arena segment created");
            }
            Err(_) => {
                // Another thread published this segment first
                // SAFETY: `raw` was never shared.
                unsafe { dealloc(raw.cast(), layout) };
            }
        }
        Ok(())
    }

    fn segment_layout(segment: usize) -> PoolResult<Layout> {
        Layout::array::<Slot<T>>(segment_len(segment)).map_err(|_| {
            PoolError::StackCapacityExceeded {
                capacity: MAX_STACK_NODES,
            }
        })
    }

    /// Borrow a slot that has been handed out by [`SlotArena::fresh`]
    #[inline(always)]
    pub(crate) fn slot(&self, id: SlotId) -> &Slot<T> {
        let (segment, offset) = locate(id);
        let base = self.segments[segment].load(Ordering::Acquire);
        debug_assert!(!base.is_null(), "slot {id:?} has no segment");
        // SAFETY: every id reachable from a stack head or link was returned by
        // `fresh`, which published its segment first. Segments are only freed
        // through `&mut self`.
        unsafe { &*base.add(offset) }
    }

    /// Return every segment to the system
    ///
    /// Values still stored in slots are not dropped; the owning stack drains
    /// its live values first.
    pub(crate) fn release(&mut self) {
        for segment in 0..ARENA_SEGMENTS {
            let entry = self.segments[segment].get_mut();
            if entry.is_null() {
                continue;
            }
            if let Ok(layout) = Self::segment_layout(segment) {
                // SAFETY: allocated in `ensure_segment` with this very layout.
                unsafe { dealloc(entry.cast(), layout) };
            }
            *entry = ptr::null_mut();
        }
        *self.created.get_mut() = 0;
    }
}

impl<T> Drop for SlotArena<T> {
    fn drop(&mut self) {
        self.release();
    }
}
