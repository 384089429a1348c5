//! Deferred completion handling.
//!
//! The interrupt top half only moves descriptors into the completed
//! history and raises a work signal. User code runs later, from
//! [`Channel::process_completions`](crate::Channel::process_completions),
//! through a [`CompletionHandler`].

use crate::driver::descriptor::Completion;

/// Receiver of finished transfers.
///
/// Called without the channel lock held, so implementations may query,
/// submit and issue on the same channel.
pub trait CompletionHandler {
    /// A descriptor that carried a callback argument finished.
    fn on_complete(&self, completion: &Completion);

    /// A descriptor is about to age out of the history window.
    fn on_evict(&self, _completion: &Completion) {}
}

impl<H: CompletionHandler + ?Sized> CompletionHandler for &H {
    fn on_complete(&self, completion: &Completion) {
        (**self).on_complete(completion);
    }

    fn on_evict(&self, completion: &Completion) {
        (**self).on_evict(completion);
    }
}

/// Handler that only drains callbacks.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreCompletions;

impl CompletionHandler for IgnoreCompletions {
    fn on_complete(&self, _completion: &Completion) {}
}

/// Serializes completion passes on one channel.
///
/// A pass that finds another one running records a re-run request and
/// leaves; the running pass loops once more before it exits.
#[derive(Debug, Default)]
pub(crate) struct ProcessorGate {
    running: bool,
    rerun: bool,
}

impl ProcessorGate {
    pub(crate) const fn new() -> Self {
        Self {
            running: false,
            rerun: false,
        }
    }

    /// Try to become the running pass.
    pub(crate) fn enter(&mut self) -> bool {
        if self.running {
            self.rerun = true;
            false
        } else {
            self.running = true;
            true
        }
    }

    /// Finish a loop iteration; true when another iteration is owed.
    pub(crate) fn leave(&mut self) -> bool {
        if self.rerun {
            self.rerun = false;
            true
        } else {
            self.running = false;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_admits_one_pass() {
        let mut gate = ProcessorGate::new();
        assert!(gate.enter());
        assert!(!gate.enter());
    }

    #[test]
    fn nested_entry_requests_rerun() {
        let mut gate = ProcessorGate::new();
        assert!(gate.enter());
        assert!(!gate.enter());
        assert!(gate.leave());
        assert!(!gate.leave());
        assert!(gate.enter());
    }
}
