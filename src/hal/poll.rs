//! Bounded register polling
//!
//! Every wait on the hardware (leaving HALTED after run, reaching HALTED
//! after stop, soft-reset completion) is a bounded retry loop driven by a
//! [`DelayNs`] provider. The loop never spins forever: after the last retry
//! it reports [`IoError::Timeout`].

use embedded_hal::delay::DelayNs;

use crate::driver::config::PollConfig;
use crate::driver::error::{IoError, IoResult};

// =============================================================================
// Poller
// =============================================================================

/// Bounded poll loop over a delay provider.
#[derive(Debug)]
pub struct Poller<D: DelayNs> {
    /// Delay provider
    delay: D,
    /// Retry budget and interval
    config: PollConfig,
}

impl<D: DelayNs> Poller<D> {
    /// Create a poller with the given budget
    pub fn new(delay: D, config: PollConfig) -> Self {
        Self { delay, config }
    }

    /// Poll `done` until it returns true or the retry budget runs out.
    ///
    /// `done` is evaluated `retries + 1` times at most, with one delay of
    /// `interval_us` between consecutive evaluations. Returns the number of
    /// delays taken on success.
    pub fn poll_until<F>(&mut self, mut done: F) -> IoResult<u32>
    where
        F: FnMut() -> bool,
    {
        for waited in 0..=self.config.retries {
            if done() {
                return Ok(waited);
            }
            if waited < self.config.retries {
                self.delay.delay_us(self.config.interval_us);
            }
        }

        Err(IoError::Timeout)
    }

    /// Get the configured budget
    pub fn config(&self) -> PollConfig {
        self.config
    }
}
