//! Testing utilities and mock implementations
//!
//! Host-side stand-ins for the AXI DMA core, delays and wakers, so the
//! channel engine and the streaming reader can be tested without hardware.
//!
//! Only available when running `cargo test`.

// Note: The #[cfg(test)] attribute is applied in lib.rs where this module is declared
#![allow(missing_docs)]
#![allow(clippy::std_instead_of_core, clippy::std_instead_of_alloc)]

extern crate std;

use core::future::Future;
use core::pin::pin;
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use core::task::{Context, Poll, Waker};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::Wake;
use std::vec::Vec;

use crate::driver::config::{ChannelConfig, Direction, PollConfig};
use crate::hal::mmio::RegisterBlock;
use crate::internal::register::{
    ADDR_MSB_OFFSET, ADDR_OFFSET, CONTROL_OFFSET, LENGTH_OFFSET, S2MM_OFFSET, STATUS_OFFSET,
    control, status,
};

// =============================================================================
// Mock AXI DMA Core
// =============================================================================

#[derive(Debug)]
struct ChannelSim {
    control: u32,
    status: u32,
    addr_lo: u32,
    addr_hi: u32,
    length: u32,
    /// Address and length of the transfer the hardware is working on
    in_flight: Option<(u64, u32)>,
    starts: usize,
    length_writes: Vec<u32>,
    start_stuck: bool,
    halt_stuck: bool,
}

impl ChannelSim {
    fn new() -> Self {
        Self {
            control: 0,
            status: status::HALTED,
            addr_lo: 0,
            addr_hi: 0,
            length: 0,
            in_flight: None,
            starts: 0,
            length_writes: Vec::new(),
            start_stuck: false,
            halt_stuck: false,
        }
    }

    fn address(&self) -> u64 {
        ((self.addr_hi as u64) << 32) | self.addr_lo as u64
    }

    fn running(&self) -> bool {
        self.control & control::RUN_STOP != 0 && self.status & status::HALTED == 0
    }

    fn hard_reset(&mut self) {
        self.control = 0;
        self.status = status::HALTED;
        self.length = 0;
        self.in_flight = None;
    }
}

#[derive(Debug)]
struct CoreState {
    channels: [ChannelSim; 2],
    width_mask: u32,
    reset_stuck: bool,
    resets: usize,
    writes: Vec<(usize, u32)>,
}

/// Simulated two-channel AXI DMA core in direct-register mode.
///
/// Models the parts of the register protocol the driver relies on: W1C
/// status bits, RUN clearing and setting HALTED, a soft reset that clears
/// both channels, a length register of configurable width, and a transfer
/// launched by writing the length while running.
///
/// # Example
///
/// ```ignore
/// let core = MockDmaCore::new();
/// let channel = Channel::probe(&core, NoopDelay, fast_config(Direction::DeviceToMemory))?;
/// channel.submit(request)?;
/// channel.issue_pending()?;
/// core.complete(Direction::DeviceToMemory, &payload);
/// channel.on_interrupt();
/// ```
#[derive(Debug)]
pub struct MockDmaCore {
    state: Mutex<CoreState>,
}

impl Default for MockDmaCore {
    fn default() -> Self {
        Self::new()
    }
}

fn window_of(offset: usize) -> (usize, usize) {
    if offset >= S2MM_OFFSET {
        (1, offset - S2MM_OFFSET)
    } else {
        (0, offset)
    }
}

fn index(direction: Direction) -> usize {
    match direction {
        Direction::MemoryToDevice => 0,
        Direction::DeviceToMemory => 1,
    }
}

impl MockDmaCore {
    /// Core with both channels halted and a 23-bit length register
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CoreState {
                channels: [ChannelSim::new(), ChannelSim::new()],
                width_mask: (1 << 23) - 1,
                reset_stuck: false,
                resets: 0,
                writes: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CoreState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn with_channel<R>(&self, direction: Direction, f: impl FnOnce(&mut ChannelSim) -> R) -> R {
        f(&mut self.lock().channels[index(direction)])
    }

    // -------------------------------------------------------------------------
    // Hardware events
    // -------------------------------------------------------------------------

    /// The in-flight transfer finishes after writing `data` to its buffer.
    ///
    /// Panics when nothing is in flight or `data` exceeds the transfer.
    pub fn complete(&self, direction: Direction, data: &[u8]) {
        self.with_channel(direction, |ch| {
            let (addr, len) = ch.in_flight.take().expect("no transfer in flight");
            assert!(data.len() <= len as usize, "data longer than the transfer");
            // SAFETY: tests only program addresses of live pool buffers
            unsafe {
                core::ptr::copy_nonoverlapping(data.as_ptr(), addr as usize as *mut u8, data.len());
            }
            ch.length = data.len() as u32;
            ch.status |= status::IOC_IRQ | status::IDLE;
        });
    }

    /// Raise a completion reporting `transferred` bytes, without touching memory.
    pub fn finish(&self, direction: Direction, transferred: u32) {
        self.with_channel(direction, |ch| {
            ch.in_flight = None;
            ch.length = transferred;
            ch.status |= status::IOC_IRQ | status::IDLE;
        });
    }

    /// Raise an error interrupt; the channel halts.
    pub fn raise_error(&self, direction: Direction) {
        self.with_channel(direction, |ch| {
            ch.in_flight = None;
            ch.status |= status::ERR_IRQ | status::HALTED;
        });
    }

    // -------------------------------------------------------------------------
    // Fault injection
    // -------------------------------------------------------------------------

    /// Channel ignores RUN and stays halted.
    pub fn set_start_stuck(&self, direction: Direction, stuck: bool) {
        self.with_channel(direction, |ch| ch.start_stuck = stuck);
    }

    /// Channel never reports HALTED after RUN is cleared.
    pub fn set_halt_stuck(&self, direction: Direction, stuck: bool) {
        self.with_channel(direction, |ch| ch.halt_stuck = stuck);
    }

    /// Soft-reset bit never self-clears.
    pub fn set_reset_stuck(&self, stuck: bool) {
        self.lock().reset_stuck = stuck;
    }

    /// Width of the length register in bits; 0 models a scatter-gather build.
    pub fn set_length_width(&self, bits: u32) {
        self.lock().width_mask = match bits {
            0 => 0,
            32.. => u32::MAX,
            n => (1 << n) - 1,
        };
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    pub fn control(&self, direction: Direction) -> u32 {
        self.with_channel(direction, |ch| ch.control)
    }

    pub fn status(&self, direction: Direction) -> u32 {
        self.with_channel(direction, |ch| ch.status)
    }

    /// Address and length of the running transfer
    pub fn in_flight(&self, direction: Direction) -> Option<(u64, u32)> {
        self.with_channel(direction, |ch| ch.in_flight)
    }

    /// Transfers launched on the channel
    pub fn starts(&self, direction: Direction) -> usize {
        self.with_channel(direction, |ch| ch.starts)
    }

    /// Every value written to the length register
    pub fn length_writes(&self, direction: Direction) -> Vec<u32> {
        self.with_channel(direction, |ch| ch.length_writes.clone())
    }

    /// Soft resets requested
    pub fn resets(&self) -> usize {
        self.lock().resets
    }

    /// Current register value at `offset`
    pub fn raw(&self, offset: usize) -> u32 {
        self.read(offset)
    }

    /// Every register write as `(offset, value)`
    pub fn writes(&self) -> Vec<(usize, u32)> {
        self.lock().writes.clone()
    }
}

impl RegisterBlock for MockDmaCore {
    fn read(&self, offset: usize) -> u32 {
        let state = self.lock();
        let (window, reg) = window_of(offset);
        let ch = &state.channels[window];
        match reg {
            CONTROL_OFFSET => ch.control,
            STATUS_OFFSET => ch.status,
            ADDR_OFFSET => ch.addr_lo,
            ADDR_MSB_OFFSET => ch.addr_hi,
            LENGTH_OFFSET => ch.length,
            _ => 0,
        }
    }

    fn write(&self, offset: usize, value: u32) {
        let mut state = self.lock();
        state.writes.push((offset, value));
        let (window, reg) = window_of(offset);
        let width_mask = state.width_mask;

        if reg == CONTROL_OFFSET && value & control::RESET != 0 {
            state.resets += 1;
            if state.reset_stuck {
                state.channels[window].control = value;
            } else {
                for ch in &mut state.channels {
                    ch.hard_reset();
                }
            }
            return;
        }

        let ch = &mut state.channels[window];
        match reg {
            CONTROL_OFFSET => {
                let was_running = ch.control & control::RUN_STOP != 0;
                ch.control = value;
                let run = value & control::RUN_STOP != 0;
                if run && !was_running && !ch.start_stuck {
                    ch.status &= !status::HALTED;
                }
                if !run && was_running && !ch.halt_stuck {
                    ch.status |= status::HALTED;
                    ch.in_flight = None;
                }
            }
            STATUS_OFFSET => ch.status &= !(value & status::IRQ_ALL),
            ADDR_OFFSET => ch.addr_lo = value,
            ADDR_MSB_OFFSET => ch.addr_hi = value,
            LENGTH_OFFSET => {
                let len = value & width_mask;
                ch.length = len;
                ch.length_writes.push(len);
                if ch.running() && len != 0 {
                    ch.in_flight = Some((ch.address(), len));
                    ch.starts += 1;
                    ch.status &= !status::IDLE;
                }
            }
            _ => {}
        }
    }
}

/// Channel configuration with short poll budgets for tests
pub fn fast_config(direction: Direction) -> ChannelConfig {
    let poll = PollConfig::new(3, 1);
    ChannelConfig::new(direction)
        .with_start_poll(poll)
        .with_halt_poll(poll)
        .with_reset_poll(poll)
}

// =============================================================================
// Mock Delays
// =============================================================================

/// Delay that returns immediately
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDelay;

impl embedded_hal::delay::DelayNs for NoopDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Delay that records how long it was asked to wait. Clones share the total.
#[derive(Debug, Default, Clone)]
pub struct CountingDelay {
    total_ns: Arc<AtomicU64>,
}

impl CountingDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total microseconds "delayed"
    pub fn total_us(&self) -> u64 {
        self.total_ns.load(Ordering::Relaxed) / 1_000
    }
}

impl embedded_hal::delay::DelayNs for CountingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns.fetch_add(ns as u64, Ordering::Relaxed);
    }

    fn delay_us(&mut self, us: u32) {
        self.total_ns.fetch_add(us as u64 * 1_000, Ordering::Relaxed);
    }
}

// =============================================================================
// Wakers
// =============================================================================

/// Waker target counting wake-ups
#[derive(Debug, Default)]
pub struct WakeCounter {
    wakes: AtomicUsize,
}

impl WakeCounter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self) -> usize {
        self.wakes.load(Ordering::SeqCst)
    }
}

impl Wake for WakeCounter {
    fn wake(self: Arc<Self>) {
        self.wakes.fetch_add(1, Ordering::SeqCst);
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.wakes.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn test_waker(counter: Arc<WakeCounter>) -> Waker {
    Waker::from(counter)
}

/// Poll a future once with a no-op waker.
pub fn poll_once<F: Future>(future: F) -> Poll<F::Output> {
    let future = pin!(future);
    let mut cx = Context::from_waker(Waker::noop());
    future.poll(&mut cx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::delay::DelayNs;

    #[test]
    fn mock_core_status_is_write_one_to_clear() {
        let core = MockDmaCore::new();
        core.finish(Direction::MemoryToDevice, 4);
        core.write(STATUS_OFFSET, status::IOC_IRQ);

        assert_eq!(core.status(Direction::MemoryToDevice) & status::IRQ_ALL, 0);
        assert_ne!(core.status(Direction::MemoryToDevice) & status::IDLE, 0);
    }

    #[test]
    fn mock_core_reset_clears_both_channels() {
        let core = MockDmaCore::new();
        core.write(CONTROL_OFFSET, control::RUN_STOP);
        core.write(S2MM_OFFSET + CONTROL_OFFSET, control::RUN_STOP);

        core.write(CONTROL_OFFSET, control::RESET);
        assert_eq!(core.resets(), 1);
        assert_eq!(core.control(Direction::DeviceToMemory), 0);
        assert_ne!(core.status(Direction::DeviceToMemory) & status::HALTED, 0);
    }

    #[test]
    fn mock_core_launches_on_length_write() {
        let core = MockDmaCore::new();
        core.write(S2MM_OFFSET + ADDR_OFFSET, 0x4000);
        core.write(S2MM_OFFSET + LENGTH_OFFSET, 64);
        assert_eq!(core.in_flight(Direction::DeviceToMemory), None);

        core.write(S2MM_OFFSET + CONTROL_OFFSET, control::RUN_STOP);
        core.write(S2MM_OFFSET + LENGTH_OFFSET, 64);
        assert_eq!(core.in_flight(Direction::DeviceToMemory), Some((0x4000, 64)));
        assert_eq!(core.starts(Direction::DeviceToMemory), 1);
    }

    #[test]
    fn mock_core_masks_length_width() {
        let core = MockDmaCore::new();
        core.set_length_width(16);
        core.write(LENGTH_OFFSET, u32::MAX);
        assert_eq!(core.raw(LENGTH_OFFSET), 0xFFFF);
    }

    #[test]
    fn counting_delay_shares_total() {
        let delay = CountingDelay::new();
        let mut clone = delay.clone();
        clone.delay_us(3);
        clone.delay_ns(2_000);
        assert_eq!(delay.total_us(), 5);
    }

    #[test]
    fn wake_counter_counts() {
        let counter = WakeCounter::new();
        let waker = test_waker(counter.clone());
        waker.wake_by_ref();
        waker.wake();
        assert_eq!(counter.count(), 2);
    }
}
