//! Streaming reader over a device-to-memory channel.
//!
//! A [`StreamChannel`] keeps two transfers queued to the hardware at all
//! times and turns the resulting sequence of completions into discrete
//! units for a consumer. Each unit is exactly one hardware transfer; reads
//! never split or merge units.
//!
//! When the consumer falls behind and no free buffer is left, the
//! second-oldest completed unit is recycled and counted as dropped. The
//! oldest unit is never recycled, so a reader always finds the head of the
//! stream intact.
//!
//! # Example
//!
//! ```ignore
//! static POOL: DmaPool<4, 4096> = DmaPool::new();
//!
//! let rx = Channel::probe(core, delay, ChannelConfig::new(Direction::DeviceToMemory))?;
//! let stream = StreamChannel::new(rx, &POOL, StreamConfig::new())?;
//! stream.activate()?;
//!
//! // interrupt handler
//! stream.on_interrupt();
//!
//! // worker
//! stream.run_deferred();
//!
//! // consumer
//! let mut frame = [0u8; 4096];
//! let len = stream.read(&mut frame).await?;
//! ```

use core::convert::Infallible;
use core::task::{Context, Poll};

use embedded_hal::delay::DelayNs;

use crate::driver::channel::Channel;
use crate::driver::completion::CompletionHandler;
use crate::driver::config::{Direction, ReadMode, StreamConfig};
use crate::driver::descriptor::{CallbackArg, Completion, TransferRequest, TransferStatus};
use crate::driver::error::{ConfigError, DmaError, Error, IoError, IoResult, Result};
use crate::driver::interrupt::IrqReturn;
use crate::driver::pool::DmaPool;
use crate::hal::mmio::RegisterBlock;
use crate::internal::constants::{
    DEFAULT_MAX_PACKET_LEN, DEFAULT_POOL_SIZE, PIPELINE_DEPTH, READER_WAIT_SLOTS,
};
use crate::internal::dma::{Replacement, TxPool, TxState};
use crate::sync::asynch::{ReadFuture, ReadableFuture};
use crate::sync::{CriticalSectionCell, WaitQueue};

// =============================================================================
// Counters
// =============================================================================

/// Stream counters. Monotonic; reading them never changes state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StreamStats {
    /// Completed units recycled before a reader took them
    pub dropped: u64,
    /// Bytes in dropped units
    pub dropped_bytes: u64,
    /// Units completed by the hardware
    pub completed: u64,
    /// Bytes in completed units
    pub completed_bytes: u64,
    /// Failed completions, failed submissions, exhaustion and copy-out failures
    pub errors: u64,
}

impl StreamStats {
    /// All counters zero
    pub const fn new() -> Self {
        Self {
            dropped: 0,
            dropped_bytes: 0,
            completed: 0,
            completed_bytes: 0,
            errors: 0,
        }
    }
}

/// Transactions per list. [`total`](Self::total) always equals the pool size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PoolCounts {
    /// Available for queueing
    pub free: usize,
    /// Queued to the channel
    pub pending: usize,
    /// Holding an unread unit
    pub completed: usize,
    /// Being copied out by a reader
    pub detached: usize,
}

impl PoolCounts {
    /// Sum over all lists
    pub const fn total(&self) -> usize {
        self.free + self.pending + self.completed + self.detached
    }
}

// =============================================================================
// Stream Channel
// =============================================================================

/// Streaming reader over a device-to-memory [`Channel`].
///
/// # Type Parameters
/// * `N` - Transactions (and pool buffers); at least 2
/// * `BUF` - Bytes per buffer
pub struct StreamChannel<
    'a,
    B,
    D,
    const N: usize = DEFAULT_POOL_SIZE,
    const BUF: usize = DEFAULT_MAX_PACKET_LEN,
> where
    B: RegisterBlock,
    D: DelayNs + Clone,
{
    channel: Channel<B, D>,
    pool: &'a DmaPool<N, BUF>,
    config: StreamConfig,
    transfer_len: u32,
    state: CriticalSectionCell<TxPool<N>>,
    readers: WaitQueue<READER_WAIT_SLOTS>,
}

impl<'a, B, D, const N: usize, const BUF: usize> StreamChannel<'a, B, D, N, BUF>
where
    B: RegisterBlock,
    D: DelayNs + Clone,
{
    /// Wrap a device-to-memory channel and a buffer pool.
    ///
    /// The transfer length defaults to the buffer size. It must fit both
    /// the buffer and the channel's maximum transfer length.
    pub fn new(channel: Channel<B, D>, pool: &'a DmaPool<N, BUF>, config: StreamConfig) -> Result<Self> {
        const {
            assert!(N >= 2, "a stream needs at least two transactions");
            assert!(N <= 0xFFFF, "transaction index must fit 16 bits");
        }

        if channel.direction() != Direction::DeviceToMemory {
            return Err(ConfigError::WrongDirection.into());
        }

        let transfer_len = match config.transfer_len {
            Some(len) => len,
            None => u32::try_from(BUF).map_err(|_| ConfigError::BufferTooLarge)?,
        };
        if transfer_len == 0 || transfer_len as usize > BUF {
            return Err(ConfigError::InvalidConfig.into());
        }
        if transfer_len > channel.max_transfer_len() {
            return Err(ConfigError::BufferTooLarge.into());
        }

        let pool_end = pool.bus_addr(N - 1).checked_add(BUF as u64 - 1);
        if pool_end.is_none_or(|end| end > channel.config().address_width.max_address()) {
            return Err(ConfigError::PoolOutOfRange.into());
        }

        Ok(Self {
            channel,
            pool,
            config,
            transfer_len,
            state: CriticalSectionCell::new(TxPool::new()),
            readers: WaitQueue::new(),
        })
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start streaming: queue two transactions and start the hardware.
    ///
    /// If the first transaction cannot be queued the stream is left
    /// inactive and the submit error is returned.
    pub fn activate(&self) -> Result<()> {
        self.state.with(|s| {
            if s.active {
                return Err(Error::Io(IoError::Busy));
            }
            if s.count(TxState::Free) < PIPELINE_DEPTH {
                return Err(DmaError::NoDescriptorsAvailable.into());
            }
            s.active = true;
            Ok(())
        })?;

        if let Err(e) = self.refill() {
            self.deactivate();
            return Err(e);
        }
        Ok(())
    }

    /// Stop streaming.
    ///
    /// Halts the channel (best effort), returns pending and completed
    /// transactions to free and interrupts waiting readers. A transaction a
    /// reader is copying out returns to free when that read finishes.
    ///
    /// A buffer that was active may still receive a trailing burst after
    /// this returns; the pool must outlive the stream regardless.
    pub fn deactivate(&self) {
        self.state.with(|s| s.active = false);
        self.channel.terminate();
        let reclaimed = self.state.with(|s| {
            s.epoch = s.epoch.wrapping_add(1);
            s.reclaim()
        });
        self.readers.wake_all();
        debug!("stream: deactivated, {} transactions reclaimed", reclaimed);
    }

    /// Deactivate and hand back the channel.
    pub fn release(self) -> Channel<B, D> {
        self.deactivate();
        self.channel
    }

    /// Reset the channel, drain its completions and refill the pipeline.
    pub fn recover(&self) -> Result<()> {
        self.channel.reset()?;
        self.channel.process_completions(self);
        self.refill()?;
        self.channel.issue_pending()
    }

    // =========================================================================
    // Interrupt and Deferred Work
    // =========================================================================

    /// Forward the channel interrupt.
    pub fn on_interrupt(&self) -> IrqReturn {
        self.channel.on_interrupt()
    }

    /// Run the deferred completion pass with this stream as handler.
    pub fn run_deferred(&self) -> usize {
        self.channel.process_completions(self)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Copy out the oldest unit without waiting.
    ///
    /// Fails with `WouldBlock` when nothing is ready, `BufferTooSmall`
    /// (without consuming) when `dst` cannot hold the unit, and
    /// `InvalidState` when the stream is inactive.
    pub fn try_read(&self, dst: &mut [u8]) -> IoResult<usize> {
        self.read_with(dst.len(), |src| {
            dst[..src.len()].copy_from_slice(src);
            Ok::<(), Infallible>(())
        })
    }

    /// Hand the oldest unit to `copy`, then recycle it.
    ///
    /// A copy error is counted and reported as `CopyFailed`; the
    /// transaction is recycled either way.
    pub fn read_with<E, F>(&self, capacity: usize, copy: F) -> IoResult<usize>
    where
        F: FnOnce(&[u8]) -> core::result::Result<(), E>,
    {
        let (idx, len) = self.state.with(|s| s.detach_oldest(capacity))?;

        // SAFETY: the transaction is detached; only this reader touches it
        let data = unsafe { self.pool.filled(idx, len as usize) };
        let copied = copy(data).is_ok();

        self.state.with(|s| s.release_detached(idx, copied));
        // failures are counted and logged by submit_slot
        let _ = self.refill();

        if copied {
            Ok(len as usize)
        } else {
            warn!("stream: copy-out of {} bytes failed", len);
            Err(IoError::CopyFailed)
        }
    }

    /// Read one unit, waiting for it in [`ReadMode::Blocking`].
    ///
    /// A pending read resolves to `Interrupted` after
    /// [`interrupt_readers`](Self::interrupt_readers) or
    /// [`deactivate`](Self::deactivate).
    pub fn read<'r>(&'r self, dst: &'r mut [u8]) -> ReadFuture<'r, 'a, B, D, N, BUF> {
        ReadFuture::new(self, dst, self.epoch())
    }

    /// Blocking read that parks the calling thread.
    #[cfg(feature = "std")]
    pub fn read_blocking(&self, dst: &mut [u8]) -> IoResult<usize> {
        futures_lite::future::block_on(self.read(dst))
    }

    pub(crate) fn epoch(&self) -> u32 {
        self.state.with_ref(|s| s.epoch)
    }

    pub(crate) fn poll_read(
        &self,
        cx: &mut Context<'_>,
        dst: &mut [u8],
        epoch: u32,
    ) -> Poll<IoResult<usize>> {
        if let Some(done) = self.read_attempt(dst, epoch) {
            return Poll::Ready(done);
        }
        self.readers.register(cx.waker());
        match self.read_attempt(dst, epoch) {
            Some(done) => Poll::Ready(done),
            None => Poll::Pending,
        }
    }

    /// `None` when the read should wait.
    fn read_attempt(&self, dst: &mut [u8], epoch: u32) -> Option<IoResult<usize>> {
        if self.epoch() != epoch {
            return Some(Err(IoError::Interrupted));
        }
        match self.try_read(dst) {
            Err(IoError::WouldBlock) if self.config.read_mode == ReadMode::Blocking => None,
            done => Some(done),
        }
    }

    /// Wake every waiting reader; each read pending now fails with
    /// `Interrupted`.
    pub fn interrupt_readers(&self) {
        self.state.with(|s| s.epoch = s.epoch.wrapping_add(1));
        self.readers.wake_all();
    }

    // =========================================================================
    // Readiness
    // =========================================================================

    /// A unit is ready
    pub fn is_readable(&self) -> bool {
        self.state.with_ref(|s| s.count(TxState::Completed) > 0)
    }

    /// Ready once a unit is available.
    pub fn poll_readable(&self, cx: &mut Context<'_>) -> Poll<()> {
        if self.is_readable() {
            return Poll::Ready(());
        }
        self.readers.register(cx.waker());
        if self.is_readable() {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }

    /// Wait until a unit is available.
    pub fn readable(&self) -> ReadableFuture<'_, 'a, B, D, N, BUF> {
        ReadableFuture::new(self)
    }

    /// Length of the next unit, 0 when none is ready
    pub fn next_unit_len(&self) -> u32 {
        self.state.with_ref(TxPool::next_len)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Underlying channel
    pub fn channel(&self) -> &Channel<B, D> {
        &self.channel
    }

    /// Bytes requested per transfer
    pub fn transfer_len(&self) -> u32 {
        self.transfer_len
    }

    /// Stream is active
    pub fn is_active(&self) -> bool {
        self.state.with_ref(|s| s.active)
    }

    /// Counter snapshot
    pub fn stats(&self) -> StreamStats {
        self.state.with_ref(|s| s.stats)
    }

    /// Transactions per list
    pub fn pool_counts(&self) -> PoolCounts {
        self.state.with_ref(TxPool::counts)
    }

    // =========================================================================
    // Pipeline
    // =========================================================================

    /// Queue free transactions until two are pending, then issue.
    ///
    /// Returns the number queued, or the first submit error. Anything
    /// queued before the error is still issued.
    fn refill(&self) -> Result<usize> {
        let mut queued = 0;
        let mut failure = None;
        while let Some((idx, arg)) = self.state.with(|s| s.arm_free_below(PIPELINE_DEPTH)) {
            match self.submit_slot(idx, arg) {
                Ok(true) => queued += 1,
                Ok(false) => break,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        if queued > 0 {
            self.issue();
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(queued),
        }
    }

    /// Hand an armed transaction to the channel.
    ///
    /// The descriptor is queued inside the same critical section that
    /// checks the transaction still belongs to the current activation, so
    /// [`deactivate`](Self::deactivate) either sees it in the channel and
    /// discards it, or it is never queued. `Ok(false)` means the
    /// transaction was reclaimed in between.
    fn submit_slot(&self, idx: usize, arg: CallbackArg) -> Result<bool> {
        let request = TransferRequest::single(
            Direction::DeviceToMemory,
            self.pool.bus_addr(idx),
            self.transfer_len,
        )
        .with_callback(arg);

        // the reset polls the hardware, so it runs outside the lock
        let result = self.channel.reset_if_failed().and_then(|()| {
            self.state.with(|s| {
                if s.resolve(arg) != Some(idx) {
                    return Ok(false);
                }
                self.channel.enqueue(request).map(|_| true)
            })
        });

        match result {
            Ok(true) => Ok(true),
            Ok(false) => {
                debug!("stream: slot {} reclaimed before submit", idx);
                Ok(false)
            }
            Err(e) => {
                self.state.with(|s| {
                    if s.resolve(arg) == Some(idx) {
                        s.disarm(idx);
                    }
                    s.stats.errors += 1;
                });
                error!("stream: submit failed: {}", e);
                Err(e)
            }
        }
    }

    fn issue(&self) {
        if let Err(e) = self.channel.issue_pending() {
            error!("stream: issue failed: {}", e);
        }
    }
}

impl<B, D, const N: usize, const BUF: usize> CompletionHandler for StreamChannel<'_, B, D, N, BUF>
where
    B: RegisterBlock,
    D: DelayNs + Clone,
{
    fn on_complete(&self, done: &Completion) {
        let Some(arg) = done.arg else {
            return;
        };
        if self.state.with_ref(|s| s.resolve(arg)).is_none() {
            debug!("stream: stale completion {} ignored", done.cookie.get());
            return;
        }

        let status = self.channel.query_status(done.cookie);
        let replacement = self.state.with(|s| {
            // deactivate may have run since the first check
            let idx = s.resolve(arg)?;
            match status {
                TransferStatus::Complete { residue } => {
                    s.complete(idx, self.transfer_len.saturating_sub(residue));
                    Some(Ok(s.replacement()))
                }
                _ => {
                    s.disarm(idx);
                    s.stats.errors += 1;
                    Some(Err(status))
                }
            }
        });

        let replacement = match replacement {
            None => return,
            Some(Err(status)) => {
                warn!(
                    "stream: transfer {} did not complete cleanly: {:?}",
                    done.cookie.get(),
                    status
                );
                return;
            }
            Some(Ok(replacement)) => replacement,
        };

        self.readers.wake_all();

        match replacement {
            Replacement::Free(idx, arg) => {
                if let Ok(true) = self.submit_slot(idx, arg) {
                    self.issue();
                }
            }
            Replacement::Stolen(idx, arg) => {
                debug!("stream: reader behind, unit in slot {} dropped", idx);
                if let Ok(true) = self.submit_slot(idx, arg) {
                    self.issue();
                }
            }
            Replacement::Exhausted => {
                error!("stream: no transaction available, pipeline narrowed");
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
