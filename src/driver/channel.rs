//! AXI DMA channel engine (direct-register mode).
//!
//! One [`Channel`] drives one direction of the core. It accepts
//! single-buffer transfers into a pending FIFO, programs them into the
//! hardware one at a time, services the channel interrupt, keeps a bounded
//! history of finished transfers for status queries, and hands finished
//! transfers to a [`CompletionHandler`] from a deferred context.
//!
//! # Locking
//!
//! All queue state sits behind one critical section per channel. Register
//! polls that wait on the hardware (start, halt, reset) run with the lock
//! released; the head descriptor is claimed before the wait so concurrent
//! callers of [`Channel::issue_pending`] see the channel as busy.
//!
//! # Example
//!
//! ```ignore
//! let core = unsafe { Mmio::new(0x4040_0000) };
//! let tx = Channel::probe(core, delay, ChannelConfig::new(Direction::MemoryToDevice))?;
//!
//! let cookie = tx.submit(TransferRequest::single(Direction::MemoryToDevice, addr, 1500))?;
//! tx.issue_pending()?;
//!
//! // interrupt handler
//! tx.on_interrupt();
//!
//! // worker
//! tx.process_completions(&handler);
//! ```

use core::task::{Context, Poll};

use embedded_hal::delay::DelayNs;

use crate::driver::completion::{CompletionHandler, ProcessorGate};
use crate::driver::config::{ChannelConfig, ChannelState, Direction, PollConfig};
use crate::driver::descriptor::{Cookie, Outcome, TransferRequest, TransferStatus};
use crate::driver::error::{ConfigError, DmaError, DmaResult, IoResult, Result};
use crate::driver::interrupt::{InterruptStatus, IrqReturn};
use crate::hal::mmio::RegisterBlock;
use crate::hal::poll::Poller;
use crate::internal::constants::{DEFAULT_DESCRIPTOR_SLOTS, HISTORY_DEPTH, LENGTH_PROBE_PATTERN};
use crate::internal::dma::{Descriptor, DescriptorArena, SlotState};
use crate::internal::register::ChannelRegs;
use crate::sync::asynch::WorkFuture;
use crate::sync::{CriticalSectionCell, WorkSignal};

// =============================================================================
// Statistics
// =============================================================================

/// Channel counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelStats {
    /// Transfers accepted by `submit`
    pub submitted: u64,
    /// Completion interrupts that finished a descriptor
    pub completed: u64,
    /// Error interrupts
    pub error_irqs: u64,
    /// Completions reporting more bytes than requested
    pub length_errors: u64,
    /// Completion interrupts with nothing active
    pub spurious_completions: u64,
    /// Start polls that timed out
    pub start_timeouts: u64,
    /// Successful soft resets
    pub resets: u64,
}

// =============================================================================
// Engine State
// =============================================================================

struct EngineState<const SLOTS: usize> {
    state: ChannelState,
    arena: DescriptorArena<SLOTS>,
    /// Slot programmed into (or being programmed into) the hardware
    active: Option<usize>,
    /// Length register written for the active slot
    launched: bool,
    last_cookie: Option<Cookie>,
    stats: ChannelStats,
}

impl<const SLOTS: usize> EngineState<SLOTS> {
    const fn new() -> Self {
        Self {
            state: ChannelState::Idle,
            arena: DescriptorArena::new(),
            active: None,
            launched: false,
            last_cookie: None,
            stats: ChannelStats {
                submitted: 0,
                completed: 0,
                error_irqs: 0,
                length_errors: 0,
                spurious_completions: 0,
                start_timeouts: 0,
                resets: 0,
            },
        }
    }

    fn next_cookie(&self) -> Cookie {
        self.last_cookie.map_or(Cookie::FIRST, Cookie::next)
    }

    /// Move the active descriptor to history with `transferred` bytes.
    fn finish_active(&mut self, transferred: u32) -> Option<(Cookie, u32, Outcome)> {
        let idx = self.active.take()?;
        let desc = *self.arena.get(idx);
        let outcome = if transferred > desc.requested {
            self.stats.length_errors += 1;
            Outcome::LengthOverrun
        } else {
            Outcome::Success
        };
        self.arena.finish(idx, transferred, outcome);
        self.launched = false;
        if self.state == ChannelState::Busy {
            self.state = ChannelState::Idle;
        }
        self.stats.completed += 1;
        Some((desc.cookie, desc.requested, outcome))
    }
}

// =============================================================================
// Channel
// =============================================================================

/// One direction of an AXI DMA core in direct-register mode.
///
/// # Type Parameters
/// * `B` - Register block (usually [`Mmio`](crate::hal::Mmio))
/// * `D` - Delay provider for bounded register polls
/// * `SLOTS` - Descriptor slots (history plus in-flight work)
pub struct Channel<B, D, const SLOTS: usize = DEFAULT_DESCRIPTOR_SLOTS>
where
    B: RegisterBlock,
    D: DelayNs + Clone,
{
    regs: ChannelRegs<B>,
    delay: D,
    config: ChannelConfig,
    max_len: u32,
    inner: CriticalSectionCell<EngineState<SLOTS>>,
    work: WorkSignal,
    gate: CriticalSectionCell<ProcessorGate>,
}

impl<B, D, const SLOTS: usize> Channel<B, D, SLOTS>
where
    B: RegisterBlock,
    D: DelayNs + Clone,
{
    // =========================================================================
    // Bring-up
    // =========================================================================

    /// Reset the core, discover the maximum transfer length and enable the
    /// channel interrupts.
    ///
    /// The soft reset affects both channels of the core; use
    /// [`probe_pair`](Self::probe_pair) when both directions are in use.
    pub fn probe(block: B, delay: D, config: ChannelConfig) -> Result<Self> {
        Self::bring_up(block, delay, config, true)
    }

    /// Probe both channels of one core with a single soft reset.
    pub fn probe_pair(
        block: B,
        delay: D,
        mm2s: ChannelConfig,
        s2mm: ChannelConfig,
    ) -> Result<(Self, Self)>
    where
        B: Clone,
    {
        if mm2s.direction != Direction::MemoryToDevice
            || s2mm.direction != Direction::DeviceToMemory
        {
            return Err(ConfigError::WrongDirection.into());
        }
        let tx = Self::bring_up(block.clone(), delay.clone(), mm2s, true)?;
        let rx = Self::bring_up(block, delay, s2mm, false)?;
        Ok((tx, rx))
    }

    fn bring_up(block: B, delay: D, config: ChannelConfig, reset: bool) -> Result<Self> {
        let mut channel = Self {
            regs: ChannelRegs::new(block, config.direction.window()),
            delay,
            config,
            max_len: 0,
            inner: CriticalSectionCell::new(EngineState::new()),
            work: WorkSignal::new(),
            gate: CriticalSectionCell::new(ProcessorGate::new()),
        };

        if reset && channel.hw_reset().is_err() {
            error!("{}: soft reset timed out during probe", channel.name());
            return Err(ConfigError::ResetFailed.into());
        }

        channel.max_len = channel.discover_max_len();
        if channel.max_len == 0 {
            error!(
                "{}: zero-width length register, core is not in direct-register mode",
                channel.name()
            );
            return Err(ConfigError::UnsupportedMode.into());
        }

        channel.regs.enable_irqs();
        info!(
            "{}: channel ready, max transfer {} bytes",
            channel.name(),
            channel.max_len
        );
        Ok(channel)
    }

    /// Write all ones to the length register and read back its width.
    fn discover_max_len(&self) -> u32 {
        self.regs.set_length(LENGTH_PROBE_PATTERN);
        let mask = self.regs.length();
        self.regs.set_length(0);
        mask
    }

    /// Halt the channel, drop queued work and disable its interrupts.
    pub fn release(self) -> B {
        self.terminate();
        self.regs.disable_irqs();
        self.regs.into_block()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Channel direction
    pub fn direction(&self) -> Direction {
        self.config.direction
    }

    /// Channel name, `"mm2s"` or `"s2mm"`
    pub fn name(&self) -> &'static str {
        self.config.direction.name()
    }

    /// Peripheral identifier
    pub fn peripheral_id(&self) -> u32 {
        self.config.direction.peripheral_id()
    }

    /// Interrupt line recorded in the configuration
    pub fn irq(&self) -> Option<u32> {
        self.config.irq
    }

    /// Largest transfer the length register can express
    pub fn max_transfer_len(&self) -> u32 {
        self.max_len
    }

    /// Configuration the channel was probed with
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Current channel state
    pub fn state(&self) -> ChannelState {
        self.inner.with_ref(|s| s.state)
    }

    /// Counter snapshot
    pub fn stats(&self) -> ChannelStats {
        self.inner.with_ref(|s| s.stats)
    }

    /// Descriptors waiting in the pending queue
    pub fn pending_count(&self) -> usize {
        self.inner.with_ref(|s| s.arena.count(SlotState::Pending))
    }

    /// Descriptors held in the completed history
    pub fn history_len(&self) -> usize {
        self.inner.with_ref(|s| s.arena.count(SlotState::Completed))
    }

    /// A descriptor is programmed into the hardware
    pub fn is_active(&self) -> bool {
        self.inner.with_ref(|s| s.active.is_some())
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Queue a transfer. Does not start the hardware.
    ///
    /// A channel in [`ChannelState::Error`] is reset first; if that reset
    /// fails the request is rejected.
    pub fn submit(&self, request: TransferRequest) -> Result<Cookie> {
        self.reset_if_failed()?;
        self.enqueue(request)
    }

    /// Reset the core if the channel is in [`ChannelState::Error`].
    pub(crate) fn reset_if_failed(&self) -> Result<()> {
        if self.state() == ChannelState::Error {
            warn!("{}: channel in error state, resetting core", self.name());
            self.reset()?;
        }
        Ok(())
    }

    /// Validate and queue without touching the hardware.
    pub(crate) fn enqueue(&self, request: TransferRequest) -> Result<Cookie> {
        self.validate(&request)?;

        let segment = request.segment();
        let cookie = self.inner.with(|s| {
            let cookie = s.next_cookie();
            s.arena
                .insert(Descriptor {
                    cookie,
                    addr: segment.addr,
                    requested: segment.len,
                    transferred: 0,
                    outcome: Outcome::Success,
                    callback: request.callback(),
                    length_sink: request.length_sink(),
                })
                .ok_or(DmaError::NoDescriptorsAvailable)?;
            s.last_cookie = Some(cookie);
            s.stats.submitted += 1;
            if let Some(sink) = request.length_sink() {
                sink.store(0, core::sync::atomic::Ordering::Release);
            }
            Ok::<Cookie, DmaError>(cookie)
        })?;

        Ok(cookie)
    }

    fn validate(&self, request: &TransferRequest) -> DmaResult<()> {
        let segment = request.segment();
        if request.direction() != self.config.direction {
            return Err(DmaError::DirectionMismatch);
        }
        if segment.len == 0 {
            return Err(DmaError::InvalidLength);
        }
        if segment.len > self.max_len {
            return Err(DmaError::TransferTooLarge);
        }
        if segment.addr > self.config.address_width.max_address() {
            return Err(DmaError::AddressOutOfRange);
        }
        Ok(())
    }

    /// Start the head of the pending queue if the channel is idle.
    ///
    /// Idempotent: returns `Ok` without touching the hardware when the
    /// channel is busy, in error, or has nothing queued. If the channel
    /// does not leave HALTED in time the descriptor stays at the head of
    /// the queue and the channel enters [`ChannelState::Error`].
    pub fn issue_pending(&self) -> Result<()> {
        let claim = self.inner.with(|s| {
            if s.state != ChannelState::Idle || s.active.is_some() {
                return None;
            }
            let idx = s.arena.head_pending()?;
            s.arena.claim(idx);
            s.active = Some(idx);
            s.launched = false;
            s.state = ChannelState::Busy;
            let desc = s.arena.get(idx);
            Some((idx, desc.addr, desc.requested))
        });
        let Some((idx, addr, len)) = claim else {
            return Ok(());
        };

        self.regs.set_address(addr, self.wide());
        if let Err(e) = self.hw_start() {
            error!("{}: channel did not leave halted state", self.name());
            self.inner.with(|s| {
                if s.active == Some(idx) {
                    s.active = None;
                    s.arena.requeue(idx);
                }
                s.state = ChannelState::Error;
                s.stats.start_timeouts += 1;
            });
            return Err(e.into());
        }

        self.inner.with(|s| {
            if s.active == Some(idx) && s.state == ChannelState::Busy {
                s.launched = true;
                self.regs.set_length(len);
            }
        });
        Ok(())
    }

    // =========================================================================
    // Interrupt Top Half
    // =========================================================================

    /// Service the channel interrupt.
    ///
    /// Acknowledges the pending bits. An error moves the channel to
    /// [`ChannelState::Error`] and stops there. A completion finishes the
    /// active descriptor, starts the next one and schedules the deferred
    /// completion pass. Never calls user code.
    pub fn on_interrupt(&self) -> IrqReturn {
        let status = InterruptStatus::from_raw(self.regs.status());
        if !status.any() {
            return IrqReturn::None;
        }
        self.regs.ack(status.to_raw());

        if status.has_error() {
            self.inner.with(|s| {
                s.state = ChannelState::Error;
                s.stats.error_irqs += 1;
            });
            error!("{}: channel error interrupt", self.name());
            return IrqReturn::Handled;
        }

        self.on_completion_interrupt();
        IrqReturn::Handled
    }

    /// Finish the active descriptor with the hardware-reported length and
    /// advance to the next pending one.
    pub fn on_completion_interrupt(&self) {
        let transferred = self.regs.length();
        let Some((cookie, requested, outcome)) =
            self.inner.with(|s| match s.finish_active(transferred) {
                None => {
                    s.stats.spurious_completions += 1;
                    None
                }
                done => done,
            })
        else {
            warn!("{}: completion with no active descriptor", self.name());
            return;
        };

        if outcome == Outcome::LengthOverrun {
            error!(
                "{}: transfer {} reported {} bytes, requested {}",
                self.name(),
                cookie.get(),
                transferred,
                requested
            );
        }

        // start timeouts are logged and recorded by issue_pending
        let _ = self.issue_pending();
        self.work.schedule();
    }

    // =========================================================================
    // Status and Control
    // =========================================================================

    /// Look up a transfer by cookie.
    ///
    /// The active descriptor reports a live residue from the length
    /// register; history is searched newest first.
    pub fn query_status(&self, cookie: Cookie) -> TransferStatus {
        self.inner.with_ref(|s| {
            if let Some(idx) = s.active {
                let desc = s.arena.get(idx);
                if desc.cookie == cookie {
                    let residue = if s.launched {
                        desc.requested.saturating_sub(self.regs.length())
                    } else {
                        desc.requested
                    };
                    return TransferStatus::InProgress { residue };
                }
            }

            if let Some(idx) = s.arena.find_completed(cookie) {
                let desc = s.arena.get(idx);
                return match desc.outcome {
                    Outcome::Success => TransferStatus::Complete {
                        residue: desc.requested.saturating_sub(desc.transferred),
                    },
                    Outcome::LengthOverrun | Outcome::Aborted => TransferStatus::Error,
                };
            }

            if s.arena.find_pending(cookie).is_some() {
                return TransferStatus::Queued;
            }

            TransferStatus::NotFound
        })
    }

    /// Halt the channel and discard pending and active work.
    ///
    /// The halt is best effort: a device-to-memory channel may not halt
    /// while its stream has no data, which is logged and tolerated. The
    /// completed history is kept. Returns the number of discarded
    /// descriptors.
    ///
    /// A completion interrupt for the discarded active transfer can still
    /// arrive afterwards; it is acknowledged and ignored.
    pub fn terminate(&self) -> usize {
        if self.hw_halt().is_err() {
            warn!("{}: channel did not halt", self.name());
        }

        let discarded = self.inner.with(|s| {
            let mut discarded = s.arena.discard_pending();
            if let Some(idx) = s.active.take() {
                s.arena.discard(idx);
                discarded += 1;
            }
            s.launched = false;
            if s.state == ChannelState::Busy {
                s.state = ChannelState::Idle;
            }
            discarded
        });
        debug!("{}: terminated, {} descriptors discarded", self.name(), discarded);
        discarded
    }

    /// Soft-reset the core and bring this channel back to idle.
    ///
    /// The reset also stops the sibling channel of the same core. A
    /// descriptor left active is finished as [`Outcome::Aborted`]; its
    /// callback still runs in the next completion pass. Pending work is
    /// kept; call [`issue_pending`](Self::issue_pending) to restart it.
    pub fn reset(&self) -> Result<()> {
        warn!(
            "{}: soft reset, the sibling channel is reset too",
            self.name()
        );
        if self.hw_reset().is_err() {
            self.inner.with(|s| s.state = ChannelState::Error);
            error!("{}: soft reset timed out", self.name());
            return Err(ConfigError::ResetFailed.into());
        }
        self.regs.enable_irqs();

        let aborted = self.inner.with(|s| {
            s.stats.resets += 1;
            s.launched = false;
            s.state = ChannelState::Idle;
            match s.active.take() {
                Some(idx) => {
                    s.arena.finish(idx, 0, Outcome::Aborted);
                    true
                }
                None => false,
            }
        });
        if aborted {
            self.work.schedule();
        }
        Ok(())
    }

    /// Reset and restart queued work.
    pub fn recover(&self) -> Result<()> {
        self.reset()?;
        self.issue_pending()
    }

    // =========================================================================
    // Deferred Completion Pass
    // =========================================================================

    /// Deliver finished transfers to `handler`, then trim the history.
    ///
    /// Each callback runs exactly once, oldest completion first, with the
    /// channel lock released. The history is trimmed to its retention
    /// depth afterwards, calling [`CompletionHandler::on_evict`] before
    /// each eviction. A call made while another pass is running (for
    /// example from inside the handler) returns immediately and makes the
    /// running pass loop again. Returns the number of callbacks delivered.
    pub fn process_completions<H>(&self, handler: &H) -> usize
    where
        H: CompletionHandler + ?Sized,
    {
        if !self.gate.with(ProcessorGate::enter) {
            return 0;
        }

        let mut delivered = 0;
        loop {
            self.work.take();

            while let Some(done) = self.inner.with(|s| s.arena.take_next_callback()) {
                handler.on_complete(&done);
                delivered += 1;
            }

            while let Some((idx, aged)) = self.inner.with(|s| s.arena.evictable(HISTORY_DEPTH)) {
                handler.on_evict(&aged);
                self.inner.with(|s| s.arena.evict(idx));
            }

            if !self.gate.with(ProcessorGate::leave) {
                break;
            }
        }
        delivered
    }

    /// Deferred work has been scheduled and not yet processed
    pub fn has_pending_work(&self) -> bool {
        self.work.is_pending()
    }

    /// Wait until deferred work is scheduled.
    pub fn wait_for_work(&self) -> WorkFuture<'_> {
        WorkFuture::new(&self.work)
    }

    /// Poll form of [`wait_for_work`](Self::wait_for_work).
    pub fn poll_work(&self, cx: &mut Context<'_>) -> Poll<()> {
        self.work.poll_wait(cx)
    }

    // =========================================================================
    // Hardware Sequences
    // =========================================================================

    fn wide(&self) -> bool {
        self.config.address_width == crate::driver::config::AddressWidth::Bits64
    }

    fn poller(&self, config: PollConfig) -> Poller<D> {
        Poller::new(self.delay.clone(), config)
    }

    /// Set run and wait for HALTED to clear.
    fn hw_start(&self) -> IoResult<()> {
        self.regs.set_run();
        self.poller(self.config.start_poll)
            .poll_until(|| !self.regs.is_halted())
            .map(|_| ())
    }

    /// Clear run and wait for HALTED.
    fn hw_halt(&self) -> IoResult<()> {
        self.regs.clear_run();
        self.poller(self.config.halt_poll)
            .poll_until(|| self.regs.is_halted())
            .map(|_| ())
    }

    /// Set the reset bit and wait for it to self-clear.
    fn hw_reset(&self) -> IoResult<()> {
        self.regs.start_reset();
        self.poller(self.config.reset_poll)
            .poll_until(|| !self.regs.is_resetting())
            .map(|_| ())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::std_instead_of_core, clippy::std_instead_of_alloc)]
mod tests {
    extern crate std;

    use core::cell::{Cell, RefCell};
    use core::sync::atomic::{AtomicU32, Ordering};
    use std::vec::Vec;

    use super::*;
    use crate::driver::completion::IgnoreCompletions;
    use crate::driver::config::AddressWidth;
    use crate::driver::descriptor::{CallbackArg, Completion};
    use crate::driver::error::{Error, IoError};
    use crate::internal::register::{S2MM_OFFSET, control};
    use crate::test_utils::{MockDmaCore, NoopDelay, fast_config};

    type TestChannel<'a> = Channel<&'a MockDmaCore, NoopDelay>;

    fn tx(core: &MockDmaCore) -> TestChannel<'_> {
        Channel::probe(core, NoopDelay, fast_config(Direction::MemoryToDevice)).unwrap()
    }

    fn rx(core: &MockDmaCore) -> TestChannel<'_> {
        Channel::probe(core, NoopDelay, fast_config(Direction::DeviceToMemory)).unwrap()
    }

    fn request(len: u32) -> TransferRequest {
        TransferRequest::single(Direction::MemoryToDevice, 0x1000, len)
    }

    #[derive(Default)]
    struct Recorder {
        completed: RefCell<Vec<Completion>>,
        evicted: RefCell<Vec<Cookie>>,
    }

    impl CompletionHandler for Recorder {
        fn on_complete(&self, completion: &Completion) {
            self.completed.borrow_mut().push(*completion);
        }

        fn on_evict(&self, completion: &Completion) {
            self.evicted.borrow_mut().push(completion.cookie);
        }
    }

    // =========================================================================
    // Probe
    // =========================================================================

    #[test]
    fn probe_discovers_length_width_and_enables_irqs() {
        let core = MockDmaCore::new();
        let channel = tx(&core);

        assert_eq!(channel.max_transfer_len(), 0x7F_FFFF);
        assert_eq!(channel.state(), ChannelState::Idle);
        assert_eq!(core.resets(), 1);
        assert_eq!(
            core.control(Direction::MemoryToDevice) & control::IRQ_ALL,
            control::IRQ_ALL
        );
        assert_eq!(channel.name(), "mm2s");
        assert_eq!(channel.peripheral_id(), 0x000A_3500);
    }

    #[test]
    fn probe_rejects_scatter_gather_build() {
        let core = MockDmaCore::new();
        core.set_length_width(0);

        let result = TestChannel::probe(&core, NoopDelay, fast_config(Direction::DeviceToMemory));
        assert_eq!(result.err(), Some(Error::Config(ConfigError::UnsupportedMode)));
    }

    #[test]
    fn probe_fails_when_reset_sticks() {
        let core = MockDmaCore::new();
        core.set_reset_stuck(true);

        let result = TestChannel::probe(&core, NoopDelay, fast_config(Direction::DeviceToMemory));
        assert_eq!(result.err(), Some(Error::Config(ConfigError::ResetFailed)));
    }

    #[test]
    fn probe_pair_resets_once() {
        let core = MockDmaCore::new();
        let (mm2s, s2mm) = TestChannel::probe_pair(
            &core,
            NoopDelay,
            fast_config(Direction::MemoryToDevice),
            fast_config(Direction::DeviceToMemory),
        )
        .unwrap();

        assert_eq!(core.resets(), 1);
        assert_eq!(mm2s.direction(), Direction::MemoryToDevice);
        assert_eq!(s2mm.name(), "s2mm");
    }

    #[test]
    fn release_disables_irqs() {
        let core = MockDmaCore::new();
        let channel = rx(&core);
        let _ = channel.release();
        assert_eq!(core.control(Direction::DeviceToMemory) & control::IRQ_ALL, 0);
    }

    // =========================================================================
    // Submission
    // =========================================================================

    #[test]
    fn submit_validates_requests() {
        let core = MockDmaCore::new();
        let channel = tx(&core);

        let wrong_way = TransferRequest::single(Direction::DeviceToMemory, 0x1000, 64);
        assert_eq!(channel.submit(wrong_way), Err(DmaError::DirectionMismatch.into()));
        assert_eq!(channel.submit(request(0)), Err(DmaError::InvalidLength.into()));
        assert_eq!(
            channel.submit(request(0x80_0000)),
            Err(DmaError::TransferTooLarge.into())
        );
        let high = TransferRequest::single(Direction::MemoryToDevice, 0x1_0000_0000, 64);
        assert_eq!(channel.submit(high), Err(DmaError::AddressOutOfRange.into()));
        assert_eq!(channel.pending_count(), 0);
    }

    #[test]
    fn submit_accepts_max_length_and_wide_addresses() {
        let core = MockDmaCore::new();
        let config = fast_config(Direction::MemoryToDevice).with_address_width(AddressWidth::Bits64);
        let channel: TestChannel<'_> = Channel::probe(&core, NoopDelay, config).unwrap();

        let high = TransferRequest::single(Direction::MemoryToDevice, 0x1_0000_0000, 0x7F_FFFF);
        assert!(channel.submit(high).is_ok());
        channel.issue_pending().unwrap();
        assert_eq!(core.in_flight(Direction::MemoryToDevice), Some((0x1_0000_0000, 0x7F_FFFF)));
    }

    #[test]
    fn submit_does_not_touch_hardware() {
        let core = MockDmaCore::new();
        let channel = tx(&core);

        channel.submit(request(64)).unwrap();
        assert_eq!(core.in_flight(Direction::MemoryToDevice), None);
        assert_eq!(channel.state(), ChannelState::Idle);
        assert_eq!(channel.pending_count(), 1);
    }

    #[test]
    fn cookies_increase_from_one() {
        let core = MockDmaCore::new();
        let channel = tx(&core);

        let first = channel.submit(request(8)).unwrap();
        let second = channel.submit(request(8)).unwrap();
        assert_eq!(first, Cookie::FIRST);
        assert_eq!(second.get(), 2);
    }

    #[test]
    fn submit_fails_when_arena_full() {
        let core = MockDmaCore::new();
        let channel: Channel<&MockDmaCore, NoopDelay, 2> =
            Channel::probe(&core, NoopDelay, fast_config(Direction::MemoryToDevice)).unwrap();

        channel.submit(request(8)).unwrap();
        channel.submit(request(8)).unwrap();
        assert_eq!(
            channel.submit(request(8)),
            Err(DmaError::NoDescriptorsAvailable.into())
        );
    }

    #[test]
    fn length_sink_zeroed_then_filled() {
        static SINK: AtomicU32 = AtomicU32::new(99);
        let core = MockDmaCore::new();
        let channel = tx(&core);

        channel.submit(request(64).with_length_sink(&SINK)).unwrap();
        assert_eq!(SINK.load(Ordering::Acquire), 0);

        channel.issue_pending().unwrap();
        core.finish(Direction::MemoryToDevice, 48);
        channel.on_interrupt();
        assert_eq!(SINK.load(Ordering::Acquire), 48);
    }

    // =========================================================================
    // Issue
    // =========================================================================

    #[test]
    fn issue_programs_address_then_length() {
        let core = MockDmaCore::new();
        let channel = tx(&core);

        let cookie = channel.submit(request(256)).unwrap();
        channel.issue_pending().unwrap();

        assert_eq!(channel.state(), ChannelState::Busy);
        assert_eq!(core.in_flight(Direction::MemoryToDevice), Some((0x1000, 256)));
        assert_eq!(channel.query_status(cookie), TransferStatus::InProgress { residue: 0 });
        assert_eq!(core.length_writes(Direction::MemoryToDevice).last(), Some(&256));
    }

    #[test]
    fn issue_is_idempotent_while_busy() {
        let core = MockDmaCore::new();
        let channel = tx(&core);

        channel.submit(request(64)).unwrap();
        let second = channel.submit(request(32)).unwrap();
        channel.issue_pending().unwrap();
        channel.issue_pending().unwrap();

        assert_eq!(core.starts(Direction::MemoryToDevice), 1);
        assert_eq!(channel.query_status(second), TransferStatus::Queued);
    }

    #[test]
    fn issue_with_empty_queue_is_noop() {
        let core = MockDmaCore::new();
        let channel = tx(&core);

        channel.issue_pending().unwrap();
        assert_eq!(channel.state(), ChannelState::Idle);
        assert_eq!(core.starts(Direction::MemoryToDevice), 0);
    }

    #[test]
    fn start_timeout_keeps_descriptor_queued() {
        let core = MockDmaCore::new();
        let channel = tx(&core);
        core.set_start_stuck(Direction::MemoryToDevice, true);

        let cookie = channel.submit(request(64)).unwrap();
        assert_eq!(channel.issue_pending(), Err(Error::Io(IoError::Timeout)));

        assert_eq!(channel.state(), ChannelState::Error);
        assert_eq!(channel.query_status(cookie), TransferStatus::Queued);
        assert!(!channel.is_active());
        assert_eq!(channel.stats().start_timeouts, 1);
    }

    #[test]
    fn submit_after_error_resets_core() {
        let core = MockDmaCore::new();
        let channel = tx(&core);
        core.set_start_stuck(Direction::MemoryToDevice, true);
        let first = channel.submit(request(64)).unwrap();
        let _ = channel.issue_pending();
        core.set_start_stuck(Direction::MemoryToDevice, false);

        let resets_before = core.resets();
        let second = channel.submit(request(32)).unwrap();
        assert_eq!(core.resets(), resets_before + 1);
        assert_eq!(channel.state(), ChannelState::Idle);

        channel.issue_pending().unwrap();
        assert_eq!(core.in_flight(Direction::MemoryToDevice), Some((0x1000, 64)));
        assert_eq!(channel.query_status(first), TransferStatus::InProgress { residue: 0 });
        assert_eq!(channel.query_status(second), TransferStatus::Queued);
    }

    #[test]
    fn submit_fails_when_recovery_reset_fails() {
        let core = MockDmaCore::new();
        let channel = tx(&core);
        channel.submit(request(64)).unwrap();
        channel.issue_pending().unwrap();
        core.raise_error(Direction::MemoryToDevice);
        channel.on_interrupt();

        core.set_reset_stuck(true);
        assert_eq!(
            channel.submit(request(8)),
            Err(Error::Config(ConfigError::ResetFailed))
        );
        assert_eq!(channel.state(), ChannelState::Error);
    }

    // =========================================================================
    // Interrupts
    // =========================================================================

    #[test]
    fn unrelated_interrupt_is_not_handled() {
        let core = MockDmaCore::new();
        let channel = tx(&core);
        assert_eq!(channel.on_interrupt(), IrqReturn::None);
    }

    #[test]
    fn completion_advances_to_next_pending() {
        let core = MockDmaCore::new();
        let channel = tx(&core);

        let a = channel.submit(request(100)).unwrap();
        let b = channel.submit(request(200)).unwrap();
        channel.issue_pending().unwrap();

        core.finish(Direction::MemoryToDevice, 100);
        assert_eq!(channel.on_interrupt(), IrqReturn::Handled);

        assert_eq!(channel.query_status(a), TransferStatus::Complete { residue: 0 });
        assert_eq!(channel.query_status(b), TransferStatus::InProgress { residue: 0 });
        assert_eq!(core.in_flight(Direction::MemoryToDevice), Some((0x1000, 200)));
        assert!(channel.has_pending_work());
        assert_eq!(core.status(Direction::MemoryToDevice) & crate::internal::register::status::IRQ_ALL, 0);
    }

    #[test]
    fn short_transfer_reports_residue() {
        let core = MockDmaCore::new();
        let channel = rx(&core);

        let cookie = channel
            .submit(TransferRequest::single(Direction::DeviceToMemory, 0x2000, 1000))
            .unwrap();
        channel.issue_pending().unwrap();
        core.finish(Direction::DeviceToMemory, 600);
        channel.on_interrupt();

        assert_eq!(channel.query_status(cookie), TransferStatus::Complete { residue: 400 });
        assert_eq!(channel.state(), ChannelState::Idle);
    }

    #[test]
    fn overrun_is_recorded_as_error() {
        let core = MockDmaCore::new();
        let channel = tx(&core);

        let cookie = channel.submit(request(100)).unwrap();
        channel.issue_pending().unwrap();
        core.finish(Direction::MemoryToDevice, 150);
        channel.on_interrupt();

        assert_eq!(channel.query_status(cookie), TransferStatus::Error);
        assert_eq!(channel.stats().length_errors, 1);
        assert_eq!(channel.state(), ChannelState::Idle);
    }

    #[test]
    fn error_interrupt_sets_error_without_deferred_work() {
        let core = MockDmaCore::new();
        let channel = tx(&core);

        let cookie = channel.submit(request(64)).unwrap();
        channel.issue_pending().unwrap();
        core.raise_error(Direction::MemoryToDevice);

        assert_eq!(channel.on_interrupt(), IrqReturn::Handled);
        assert_eq!(channel.state(), ChannelState::Error);
        assert!(!channel.has_pending_work());
        assert_eq!(channel.query_status(cookie), TransferStatus::InProgress { residue: 0 });
        assert_eq!(channel.stats().error_irqs, 1);
    }

    #[test]
    fn error_and_completion_together_take_error_path() {
        let core = MockDmaCore::new();
        let channel = tx(&core);

        let cookie = channel.submit(request(64)).unwrap();
        channel.issue_pending().unwrap();
        core.finish(Direction::MemoryToDevice, 64);
        core.raise_error(Direction::MemoryToDevice);

        channel.on_interrupt();
        assert_eq!(channel.state(), ChannelState::Error);
        assert_ne!(channel.query_status(cookie), TransferStatus::Complete { residue: 0 });
    }

    #[test]
    fn reset_aborts_active_descriptor() {
        let core = MockDmaCore::new();
        let channel = tx(&core);
        let recorder = Recorder::default();

        let cookie = channel
            .submit(request(64).with_callback(CallbackArg(7)))
            .unwrap();
        channel.issue_pending().unwrap();
        core.raise_error(Direction::MemoryToDevice);
        channel.on_interrupt();

        channel.recover().unwrap();
        assert_eq!(channel.state(), ChannelState::Idle);
        assert_eq!(channel.query_status(cookie), TransferStatus::Error);
        assert!(channel.has_pending_work());

        assert_eq!(channel.process_completions(&recorder), 1);
        let done = recorder.completed.borrow()[0];
        assert_eq!(done.outcome, Outcome::Aborted);
        assert_eq!(done.arg, Some(CallbackArg(7)));
    }

    #[test]
    fn reset_hits_sibling_channel() {
        let core = MockDmaCore::new();
        let (mm2s, s2mm) = TestChannel::probe_pair(
            &core,
            NoopDelay,
            fast_config(Direction::MemoryToDevice),
            fast_config(Direction::DeviceToMemory),
        )
        .unwrap();

        s2mm.submit(TransferRequest::single(Direction::DeviceToMemory, 0x3000, 64))
            .unwrap();
        s2mm.issue_pending().unwrap();
        assert!(core.in_flight(Direction::DeviceToMemory).is_some());

        mm2s.reset().unwrap();
        assert_eq!(core.in_flight(Direction::DeviceToMemory), None);
        assert_eq!(core.raw(S2MM_OFFSET) & control::RUN_STOP, 0);
    }

    // =========================================================================
    // Terminate
    // =========================================================================

    #[test]
    fn terminate_discards_work_and_keeps_history() {
        let core = MockDmaCore::new();
        let channel = tx(&core);

        let done = channel.submit(request(10)).unwrap();
        channel.issue_pending().unwrap();
        core.finish(Direction::MemoryToDevice, 10);
        channel.on_interrupt();

        let active = channel.submit(request(20)).unwrap();
        let queued = channel.submit(request(30)).unwrap();
        channel.issue_pending().unwrap();

        assert_eq!(channel.terminate(), 2);
        assert_eq!(channel.state(), ChannelState::Idle);
        assert!(!channel.is_active());
        assert_eq!(channel.query_status(active), TransferStatus::NotFound);
        assert_eq!(channel.query_status(queued), TransferStatus::NotFound);
        assert_eq!(channel.query_status(done), TransferStatus::Complete { residue: 0 });
    }

    #[test]
    fn late_completion_after_terminate_is_ignored() {
        let core = MockDmaCore::new();
        let channel = rx(&core);
        core.set_halt_stuck(Direction::DeviceToMemory, true);

        channel
            .submit(TransferRequest::single(Direction::DeviceToMemory, 0x2000, 64))
            .unwrap();
        channel.issue_pending().unwrap();
        channel.terminate();

        core.finish(Direction::DeviceToMemory, 64);
        assert_eq!(channel.on_interrupt(), IrqReturn::Handled);
        assert_eq!(channel.history_len(), 0);
        assert_eq!(channel.stats().spurious_completions, 1);
        assert!(!channel.has_pending_work());
    }

    #[test]
    fn terminate_preserves_error_state() {
        let core = MockDmaCore::new();
        let channel = tx(&core);
        channel.submit(request(8)).unwrap();
        channel.issue_pending().unwrap();
        core.raise_error(Direction::MemoryToDevice);
        channel.on_interrupt();

        channel.terminate();
        assert_eq!(channel.state(), ChannelState::Error);
    }

    // =========================================================================
    // Deferred Completion Pass
    // =========================================================================

    fn complete_n(core: &MockDmaCore, channel: &TestChannel<'_>, n: usize) -> Vec<Cookie> {
        let mut cookies = Vec::new();
        for i in 0..n {
            let cookie = channel
                .submit(request(16).with_callback(CallbackArg(i)))
                .unwrap();
            channel.issue_pending().unwrap();
            core.finish(Direction::MemoryToDevice, 16);
            channel.on_interrupt();
            cookies.push(cookie);
        }
        cookies
    }

    #[test]
    fn callbacks_run_once_in_completion_order() {
        let core = MockDmaCore::new();
        let channel = tx(&core);
        let recorder = Recorder::default();

        complete_n(&core, &channel, 3);
        assert_eq!(channel.process_completions(&recorder), 3);
        assert_eq!(channel.process_completions(&recorder), 0);

        let args: Vec<_> = recorder
            .completed
            .borrow()
            .iter()
            .map(|c| c.arg.unwrap().0)
            .collect();
        assert_eq!(args, [0, 1, 2]);
        assert!(!channel.has_pending_work());
    }

    #[test]
    fn history_window_reports_exact_residue() {
        const TOTAL: usize = HISTORY_DEPTH + 8;
        const REQUESTED: u32 = 100;
        let core = MockDmaCore::new();
        let channel = tx(&core);
        let recorder = Recorder::default();

        let mut cookies = Vec::new();
        for i in 0..TOTAL {
            let cookie = channel
                .submit(request(REQUESTED).with_callback(CallbackArg(i)))
                .unwrap();
            channel.issue_pending().unwrap();
            core.finish(Direction::MemoryToDevice, i as u32 + 1);
            channel.on_interrupt();
            cookies.push(cookie);
        }
        channel.process_completions(&recorder);

        let aged_out = TOTAL - HISTORY_DEPTH;
        assert_eq!(channel.history_len(), HISTORY_DEPTH);
        for (i, cookie) in cookies.iter().enumerate() {
            let expected = if i < aged_out {
                TransferStatus::NotFound
            } else {
                TransferStatus::Complete {
                    residue: REQUESTED - (i as u32 + 1),
                }
            };
            assert_eq!(channel.query_status(*cookie), expected, "transfer {i}");
        }
        assert_eq!(recorder.evicted.borrow().as_slice(), &cookies[..aged_out]);
    }

    #[test]
    fn history_never_evicts_uncalled_descriptors() {
        let core = MockDmaCore::new();
        let channel = tx(&core);

        let cookies = complete_n(&core, &channel, HISTORY_DEPTH + 2);
        assert_eq!(channel.history_len(), HISTORY_DEPTH + 2);
        assert_eq!(
            channel.query_status(cookies[0]),
            TransferStatus::Complete { residue: 0 }
        );

        channel.process_completions(&IgnoreCompletions);
        assert_eq!(channel.history_len(), HISTORY_DEPTH);
    }

    struct Reentrant<'a, 'c> {
        channel: &'a TestChannel<'c>,
        calls: Cell<usize>,
        nested_delivered: Cell<usize>,
    }

    impl CompletionHandler for Reentrant<'_, '_> {
        fn on_complete(&self, _completion: &Completion) {
            self.calls.set(self.calls.get() + 1);
            let nested = self.channel.process_completions(self);
            self.nested_delivered.set(self.nested_delivered.get() + nested);
        }
    }

    #[test]
    fn nested_pass_is_deferred_to_running_pass() {
        let core = MockDmaCore::new();
        let channel = tx(&core);
        complete_n(&core, &channel, 2);

        let handler = Reentrant {
            channel: &channel,
            calls: Cell::new(0),
            nested_delivered: Cell::new(0),
        };
        assert_eq!(channel.process_completions(&handler), 2);
        assert_eq!(handler.calls.get(), 2);
        assert_eq!(handler.nested_delivered.get(), 0);
    }

    struct Resubmitter<'a, 'c> {
        channel: &'a TestChannel<'c>,
        remaining: Cell<usize>,
    }

    impl CompletionHandler for Resubmitter<'_, '_> {
        fn on_complete(&self, completion: &Completion) {
            assert_eq!(
                self.channel.query_status(completion.cookie),
                TransferStatus::Complete { residue: 0 }
            );
            if self.remaining.get() > 0 {
                self.remaining.set(self.remaining.get() - 1);
                self.channel
                    .submit(request(16).with_callback(CallbackArg(99)))
                    .unwrap();
                self.channel.issue_pending().unwrap();
            }
        }
    }

    #[test]
    fn handler_may_resubmit_from_callback() {
        let core = MockDmaCore::new();
        let channel = tx(&core);
        complete_n(&core, &channel, 1);

        let handler = Resubmitter {
            channel: &channel,
            remaining: Cell::new(1),
        };
        channel.process_completions(&handler);

        assert!(channel.is_active());
        assert_eq!(core.in_flight(Direction::MemoryToDevice), Some((0x1000, 16)));
    }

    fn active_slots(channel: &TestChannel<'_>) -> usize {
        channel.inner.with_ref(|s| s.arena.count(SlotState::Active))
    }

    #[test]
    fn at_most_one_active_under_interleaving() {
        for seed in 0..32u64 {
            let mut rng = fastrand::Rng::with_seed(seed);
            let core = MockDmaCore::new();
            let channel = tx(&core);
            let mut cookies = Vec::new();

            for step in 0..400 {
                match rng.u8(..8) {
                    0 | 1 => {
                        let len = rng.u32(1..=256);
                        if let Ok(cookie) = channel.submit(request(len)) {
                            cookies.push(cookie);
                        }
                    }
                    2 => {
                        let _ = channel.issue_pending();
                    }
                    3 => {
                        if let Some((_, len)) = core.in_flight(Direction::MemoryToDevice) {
                            core.finish(Direction::MemoryToDevice, rng.u32(0..=len));
                            channel.on_interrupt();
                        }
                    }
                    4 => {
                        channel.process_completions(&IgnoreCompletions);
                    }
                    5 => {
                        if rng.u8(..8) == 0 {
                            channel.terminate();
                        } else {
                            // stray interrupt on a shared line
                            channel.on_interrupt();
                        }
                    }
                    6 => {
                        if core.in_flight(Direction::MemoryToDevice).is_some() && rng.u8(..4) == 0 {
                            core.raise_error(Direction::MemoryToDevice);
                            channel.on_interrupt();
                        }
                    }
                    _ => {
                        if !cookies.is_empty() {
                            let cookie = cookies[rng.usize(..cookies.len())];
                            let _ = channel.query_status(cookie);
                        }
                    }
                }

                let active = active_slots(&channel);
                assert!(active <= 1, "seed {seed} step {step}: {active} active");
                assert_eq!(active == 1, channel.is_active(), "seed {seed} step {step}");
                if core.in_flight(Direction::MemoryToDevice).is_some() {
                    assert!(channel.is_active(), "seed {seed} step {step}: untracked transfer");
                }
            }

            assert_eq!(channel.stats().submitted, cookies.len() as u64);
        }
    }

    #[test]
    fn wait_for_work_resolves_after_completion() {
        use crate::test_utils::poll_once;

        let core = MockDmaCore::new();
        let channel = tx(&core);

        assert_eq!(poll_once(channel.wait_for_work()), Poll::Pending);
        complete_n(&core, &channel, 1);
        assert_eq!(poll_once(channel.wait_for_work()), Poll::Ready(()));
    }
}
