/*!
 * Tagged Head
 *
 * A node identity paired with a generation counter, updated as one word.
 *
 * ## Layout
 *
 * ```text
 *   bits [63:32]  generation counter  (32 bits)
 *   bits [31:0]   slot index + 1      (32 bits, 0 = empty)
 * ```
 *
 * Nodes live in an arena and are named by index rather than address, so the
 * pair fits a plain `AtomicU64` and a single-word compare-and-swap covers it
 * on every platform.
 *
 * ## ABA
 *
 * Every successful push or pop advances the generation by one. A thread that
 * read the head, stalled, and retries its CAS after the same slot was popped
 * and pushed back sees a different generation and fails. The counter wraps
 * after 2^32 updates of one head; an ABA then needs a stall of exactly a
 * multiple of 2^32 operations landing on the same slot. See
 * [`HEAD_GENERATION_BITS`] for the wrap window.
 */

use crate::core::limits::HEAD_GENERATION_BITS;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Index of a node in a stack's slot arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct SlotId(u32);

impl SlotId {
    #[inline(always)]
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline(always)]
    pub(crate) fn index(self) -> u32 {
        self.0
    }

    /// Encode an optional slot as a link word (0 = none)
    #[inline(always)]
    pub(crate) fn encode(slot: Option<SlotId>) -> u32 {
        match slot {
            Some(SlotId(index)) => index + 1,
            None => 0,
        }
    }

    /// Decode a link word produced by [`SlotId::encode`]
    #[inline(always)]
    pub(crate) fn decode(link: u32) -> Option<SlotId> {
        link.checked_sub(1).map(SlotId)
    }
}

/// Snapshot of a tagged head
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub(crate) struct Tagged(u64);

impl Tagged {
    pub(crate) const EMPTY: Self = Self(0);

    #[inline(always)]
    pub(crate) fn new(top: Option<SlotId>, generation: u32) -> Self {
        Self((u64::from(generation) << HEAD_GENERATION_BITS) | u64::from(SlotId::encode(top)))
    }

    /// Top node, `None` when the stack is empty
    #[inline(always)]
    pub(crate) fn top(self) -> Option<SlotId> {
        SlotId::decode(self.0 as u32)
    }

    #[inline(always)]
    pub(crate) fn generation(self) -> u32 {
        (self.0 >> HEAD_GENERATION_BITS) as u32
    }

    /// The head that replaces this one when `top` becomes the new top node
    #[inline(always)]
    pub(crate) fn successor(self, top: Option<SlotId>) -> Self {
        Self::new(top, self.generation().wrapping_add(1))
    }
}

impl fmt::Debug for Tagged {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tagged({:?}, gen={})", self.top(), self.generation())
    }
}

/// Atomically updated tagged head
pub(crate) struct TaggedHead {
    word: AtomicU64,
}

impl TaggedHead {
    #[inline]
    pub(crate) const fn new() -> Self {
        Self {
            word: AtomicU64::new(Tagged::EMPTY.0),
        }
    }

    #[inline(always)]
    pub(crate) fn load(&self, order: Ordering) -> Tagged {
        Tagged(self.word.load(order))
    }

    /// Single CAS of the whole (top, generation) pair
    #[inline(always)]
    pub(crate) fn compare_exchange_weak(
        &self,
        current: Tagged,
        new: Tagged,
        success: Ordering,
        failure: Ordering,
    ) -> Result<Tagged, Tagged> {
        self.word
            .compare_exchange_weak(current.0, new.0, success, failure)
            .map(Tagged)
            .map_err(Tagged)
    }

    #[cfg(test)]
    pub(crate) fn compare_exchange(
        &self,
        current: Tagged,
        new: Tagged,
        success: Ordering,
        failure: Ordering,
    ) -> Result<Tagged, Tagged> {
        self.word
            .compare_exchange(current.0, new.0, success, failure)
            .map(Tagged)
            .map_err(Tagged)
    }

    /// Reset to empty; exclusive access only
    #[inline]
    pub(crate) fn reset(&mut self) {
        *self.word.get_mut() = Tagged::EMPTY.0;
    }
}

impl Default for TaggedHead {
    fn default() -> Self {
        Self::new()
    }
}
