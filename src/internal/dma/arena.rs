//! Descriptor arena for one channel.
//!
//! Every descriptor lives in one of four lists: free, pending (FIFO of
//! submitted work), active (at most one, owned by hardware) and completed
//! (history, oldest first). Slots are reused; nothing is allocated.

use core::sync::atomic::{AtomicU32, Ordering};

use super::slots::TaggedSlots;
use crate::driver::descriptor::{CallbackArg, Completion, Cookie, Outcome};

/// List a descriptor slot belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Unused
    Free,
    /// Submitted, waiting for the hardware
    Pending,
    /// Programmed into the hardware
    Active,
    /// Finished, retained for status queries
    Completed,
}

/// Per-transfer record
#[derive(Debug, Clone, Copy)]
pub struct Descriptor {
    pub cookie: Cookie,
    pub addr: u64,
    pub requested: u32,
    pub transferred: u32,
    pub outcome: Outcome,
    /// Taken exactly once by the completion pass
    pub callback: Option<CallbackArg>,
    pub length_sink: Option<&'static AtomicU32>,
}

impl Descriptor {
    const EMPTY: Descriptor = Descriptor {
        cookie: Cookie::FIRST,
        addr: 0,
        requested: 0,
        transferred: 0,
        outcome: Outcome::Success,
        callback: None,
        length_sink: None,
    };

    fn snapshot(&self, arg: Option<CallbackArg>) -> Completion {
        Completion {
            cookie: self.cookie,
            requested: self.requested,
            transferred: self.transferred,
            outcome: self.outcome,
            arg,
        }
    }
}

/// Descriptor storage with list bookkeeping.
pub struct DescriptorArena<const N: usize> {
    slots: TaggedSlots<SlotState, N>,
    descriptors: [Descriptor; N],
}

impl<const N: usize> DescriptorArena<N> {
    /// Create an arena with every slot free.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: TaggedSlots::new(SlotState::Free),
            descriptors: [Descriptor::EMPTY; N],
        }
    }

    /// Append `desc` to the pending queue. `None` when the arena is full.
    pub fn insert(&mut self, desc: Descriptor) -> Option<usize> {
        let idx = self.slots.oldest(SlotState::Free)?;
        self.descriptors[idx] = desc;
        self.slots.push_back(idx, SlotState::Pending);
        Some(idx)
    }

    #[inline(always)]
    pub fn get(&self, idx: usize) -> &Descriptor {
        &self.descriptors[idx]
    }

    pub fn count(&self, state: SlotState) -> usize {
        self.slots.count(state)
    }

    /// Head of the pending queue
    pub fn head_pending(&self) -> Option<usize> {
        self.slots.oldest(SlotState::Pending)
    }

    /// Pending head becomes active.
    pub fn claim(&mut self, idx: usize) {
        self.slots.retag(idx, SlotState::Active);
    }

    /// Active descriptor goes back to its place at the pending head.
    pub fn requeue(&mut self, idx: usize) {
        self.slots.retag(idx, SlotState::Pending);
    }

    /// Record the result and append to the completed history.
    pub fn finish(&mut self, idx: usize, transferred: u32, outcome: Outcome) {
        let desc = &mut self.descriptors[idx];
        desc.transferred = transferred;
        desc.outcome = outcome;
        if let Some(sink) = desc.length_sink {
            sink.store(transferred, Ordering::Release);
        }
        self.slots.push_back(idx, SlotState::Completed);
    }

    /// Return a slot to the free list.
    pub fn discard(&mut self, idx: usize) {
        self.descriptors[idx].callback = None;
        self.slots.push_back(idx, SlotState::Free);
    }

    /// Drop the whole pending queue; returns how many were dropped.
    pub fn discard_pending(&mut self) -> usize {
        let mut dropped = 0;
        while let Some(idx) = self.head_pending() {
            self.discard(idx);
            dropped += 1;
        }
        dropped
    }

    /// Newest completed descriptor with `cookie`
    pub fn find_completed(&self, cookie: Cookie) -> Option<usize> {
        self.slots
            .find_newest(SlotState::Completed, |i| self.descriptors[i].cookie == cookie)
    }

    /// Pending descriptor with `cookie`
    pub fn find_pending(&self, cookie: Cookie) -> Option<usize> {
        self.slots
            .find_oldest(SlotState::Pending, |i| self.descriptors[i].cookie == cookie)
    }

    /// Take the callback of the oldest completed descriptor that still has one.
    pub fn take_next_callback(&mut self) -> Option<Completion> {
        let idx = self.slots.find_oldest(SlotState::Completed, |i| {
            self.descriptors[i].callback.is_some()
        })?;
        let arg = self.descriptors[idx].callback.take();
        Some(self.descriptors[idx].snapshot(arg))
    }

    /// Oldest completed descriptor if the history exceeds `limit` and its
    /// callback has already run.
    pub fn evictable(&self, limit: usize) -> Option<(usize, Completion)> {
        if self.slots.count(SlotState::Completed) <= limit {
            return None;
        }
        let idx = self.slots.oldest(SlotState::Completed)?;
        let desc = &self.descriptors[idx];
        if desc.callback.is_some() {
            return None;
        }
        Some((idx, desc.snapshot(None)))
    }

    /// Free a completed descriptor chosen by [`Self::evictable`].
    pub fn evict(&mut self, idx: usize) {
        if self.slots.tag(idx) == SlotState::Completed {
            self.discard(idx);
        }
    }
}
