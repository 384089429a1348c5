//! Deferred-work signal between the interrupt top half and a worker.

use core::task::{Context, Poll};

use super::primitives::{AtomicWaker, CriticalSectionCell};

/// Level-triggered "work is pending" flag with a waker.
///
/// The interrupt path calls [`schedule`](Self::schedule); the worker waits
/// with [`poll_wait`](Self::poll_wait) and clears the flag with
/// [`take`](Self::take) right before it starts processing, so a schedule
/// that lands while it runs is never lost.
pub struct WorkSignal {
    pending: CriticalSectionCell<bool>,
    waker: AtomicWaker,
}

impl WorkSignal {
    /// Create a signal with no work pending.
    pub const fn new() -> Self {
        Self {
            pending: CriticalSectionCell::new(false),
            waker: AtomicWaker::new(),
        }
    }

    /// Mark work pending and wake the worker.
    pub fn schedule(&self) {
        self.pending.with(|p| *p = true);
        self.waker.wake();
    }

    /// Clear the flag; returns whether it was set.
    pub fn take(&self) -> bool {
        self.pending.with(|p| core::mem::replace(p, false))
    }

    /// Work is pending
    pub fn is_pending(&self) -> bool {
        self.pending.with_ref(|p| *p)
    }

    /// Ready once work is pending. Does not clear the flag.
    pub fn poll_wait(&self, cx: &mut Context<'_>) -> Poll<()> {
        if self.is_pending() {
            return Poll::Ready(());
        }
        self.waker.register(cx.waker());
        if self.is_pending() {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

impl Default for WorkSignal {
    fn default() -> Self {
        Self::new()
    }
}
