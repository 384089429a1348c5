//! Transaction bookkeeping for the streaming reader.
//!
//! A stream owns `N` transactions, one per pool buffer. Each sits in
//! exactly one list: free, pending (queued to the channel), completed
//! (holding data, oldest first) or detached (being copied out by a reader).

use super::slots::TaggedSlots;
use crate::driver::descriptor::CallbackArg;
use crate::driver::error::{IoError, IoResult};
use crate::driver::stream::{PoolCounts, StreamStats};

/// Bits of a callback argument holding the slot index
const INDEX_BITS: u32 = 16;
const INDEX_MASK: usize = (1 << INDEX_BITS) - 1;

/// List a transaction belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Free,
    Pending,
    Completed,
    Detached,
}

/// Where a completion's replacement came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replacement {
    /// Oldest free transaction
    Free(usize, CallbackArg),
    /// Second-oldest completed transaction; its data was dropped
    Stolen(usize, CallbackArg),
    /// Nothing available, pipeline narrowed
    Exhausted,
}

pub struct TxPool<const N: usize> {
    slots: TaggedSlots<TxState, N>,
    lengths: [u32; N],
    generations: [u16; N],
    pub active: bool,
    pub epoch: u32,
    pub stats: StreamStats,
}

impl<const N: usize> TxPool<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: TaggedSlots::new(TxState::Free),
            lengths: [0; N],
            generations: [0; N],
            active: false,
            epoch: 0,
            stats: StreamStats::new(),
        }
    }

    pub fn counts(&self) -> PoolCounts {
        PoolCounts {
            free: self.slots.count(TxState::Free),
            pending: self.slots.count(TxState::Pending),
            completed: self.slots.count(TxState::Completed),
            detached: self.slots.count(TxState::Detached),
        }
    }

    pub fn count(&self, state: TxState) -> usize {
        self.slots.count(state)
    }

    /// Move `idx` to pending under a fresh generation.
    pub fn arm(&mut self, idx: usize) -> CallbackArg {
        self.generations[idx] = self.generations[idx].wrapping_add(1);
        self.lengths[idx] = 0;
        self.slots.push_back(idx, TxState::Pending);
        CallbackArg(((self.generations[idx] as usize) << INDEX_BITS) | idx)
    }

    /// Arm the oldest free transaction while the pipeline is short.
    pub fn arm_free_below(&mut self, depth: usize) -> Option<(usize, CallbackArg)> {
        if !self.active || self.slots.count(TxState::Pending) >= depth {
            return None;
        }
        let idx = self.slots.oldest(TxState::Free)?;
        Some((idx, self.arm(idx)))
    }

    /// A pending transaction whose submission failed goes back to free.
    pub fn disarm(&mut self, idx: usize) {
        if self.slots.tag(idx) == TxState::Pending {
            self.slots.push_back(idx, TxState::Free);
        }
    }

    /// Map a callback argument back to a pending transaction of the
    /// current activation.
    pub fn resolve(&self, arg: CallbackArg) -> Option<usize> {
        let idx = arg.0 & INDEX_MASK;
        let generation = (arg.0 >> INDEX_BITS) as u16;
        if !self.active || idx >= N {
            return None;
        }
        (self.slots.tag(idx) == TxState::Pending && self.generations[idx] == generation)
            .then_some(idx)
    }

    /// Pending transaction finished with `len` bytes of data.
    pub fn complete(&mut self, idx: usize, len: u32) {
        self.lengths[idx] = len;
        self.slots.push_back(idx, TxState::Completed);
        self.stats.completed += 1;
        self.stats.completed_bytes += len as u64;
    }

    /// Pick the transaction to queue next: the oldest free one, else the
    /// second-oldest completed one. The oldest completed unit is never
    /// stolen so a reader always finds the head of the stream intact.
    pub fn replacement(&mut self) -> Replacement {
        if let Some(idx) = self.slots.oldest(TxState::Free) {
            return Replacement::Free(idx, self.arm(idx));
        }
        if let Some(idx) = self.slots.nth_oldest(TxState::Completed, 1) {
            self.stats.dropped += 1;
            self.stats.dropped_bytes += self.lengths[idx] as u64;
            return Replacement::Stolen(idx, self.arm(idx));
        }
        self.stats.errors += 1;
        Replacement::Exhausted
    }

    /// Detach the oldest completed transaction for a reader with
    /// `capacity` bytes of room.
    pub fn detach_oldest(&mut self, capacity: usize) -> IoResult<(usize, u32)> {
        let Some(idx) = self.slots.oldest(TxState::Completed) else {
            return Err(if self.active {
                IoError::WouldBlock
            } else {
                IoError::InvalidState
            });
        };
        let len = self.lengths[idx];
        if len as usize > capacity {
            return Err(IoError::BufferTooSmall);
        }
        self.slots.push_back(idx, TxState::Detached);
        Ok((idx, len))
    }

    /// Reader finished with a detached transaction.
    pub fn release_detached(&mut self, idx: usize, copied: bool) {
        if !copied {
            self.stats.errors += 1;
        }
        if self.slots.tag(idx) == TxState::Detached {
            self.slots.push_back(idx, TxState::Free);
        }
    }

    /// Pending and completed transactions back to free.
    pub fn reclaim(&mut self) -> usize {
        self.slots.move_all(TxState::Pending, TxState::Free)
            + self.slots.move_all(TxState::Completed, TxState::Free)
    }

    /// Length of the oldest completed unit, 0 when none
    pub fn next_len(&self) -> u32 {
        self.slots
            .oldest(TxState::Completed)
            .map_or(0, |idx| self.lengths[idx])
    }
}
