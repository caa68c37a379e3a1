/*!
 * Primitive Tagged Stack
 *
 * Treiber stack of arena slots, linked through each slot's `next` field.
 * The head pairs the top slot with a generation counter so that every
 * push/pop is a single CAS that fails if any other operation intervened.
 */

use super::arena::SlotArena;
use crate::core::sync::tagged::{SlotId, TaggedHead};
use crossbeam_utils::Backoff;
use std::sync::atomic::Ordering;

pub(crate) struct PrimStack {
    head: TaggedHead,
}

impl PrimStack {
    pub(crate) const fn new() -> Self {
        Self {
            head: TaggedHead::new(),
        }
    }

    #[inline(always)]
    fn length_of<T>(arena: &SlotArena<T>, top: Option<SlotId>) -> usize {
        top.map_or(0, |id| arena.slot(id).length.load(Ordering::Relaxed))
    }

    /// Link an exclusively owned slot on top of the stack
    pub(crate) fn push<T>(&self, arena: &SlotArena<T>, id: SlotId) {
        let node = arena.slot(id);
        let backoff = Backoff::new();
        let mut head = self.head.load(Ordering::Acquire);

        loop {
            node.next
                .store(SlotId::encode(head.top()), Ordering::Relaxed);
            node.length
                .store(Self::length_of(arena, head.top()) + 1, Ordering::Relaxed);

            match self.head.compare_exchange_weak(
                head,
                head.successor(Some(id)),
                Ordering::Release,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(current) => {
                    head = current;
                    backoff.spin();
                }
            }
        }
    }

    /// Unlink the top slot; the caller then owns it exclusively
    pub(crate) fn pop<T>(&self, arena: &SlotArena<T>) -> Option<SlotId> {
        let backoff = Backoff::new();
        let mut head = self.head.load(Ordering::Acquire);

        loop {
            let top = head.top()?;
            let next = SlotId::decode(arena.slot(top).next.load(Ordering::Relaxed));

            match self.head.compare_exchange_weak(
                head,
                head.successor(next),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(top),
                Err(current) => {
                    head = current;
                    backoff.spin();
                }
            }
        }
    }

    /// Snapshot of the element count
    ///
    /// Reads the cached length of whatever node is on top at the moment of the
    /// head load. That node may be unlinked right after, but its memory stays
    /// valid for as long as the arena is shared.
    #[inline]
    pub(crate) fn len<T>(&self, arena: &SlotArena<T>) -> usize {
        Self::length_of(arena, self.head.load(Ordering::Acquire).top())
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire).top().is_none()
    }

    pub(crate) fn reset(&mut self) {
        self.head.reset();
    }
}
