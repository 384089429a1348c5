//! Channel and stream configuration
//!
//! Builder-style configuration types. Defaults come from
//! [`crate::internal::constants`].

use crate::internal::constants::{
    HALT_POLL_RETRIES, PERIPHERAL_ID_BASE, POLL_INTERVAL_US, RESET_POLL_INTERVAL_US,
    RESET_POLL_RETRIES, START_POLL_RETRIES,
};
use crate::internal::register::{MM2S_OFFSET, S2MM_OFFSET};

// =============================================================================
// Direction
// =============================================================================

/// Transfer direction of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Memory to device (MM2S)
    MemoryToDevice,
    /// Device to memory (S2MM)
    DeviceToMemory,
}

impl Direction {
    /// Offset of this direction's register window
    pub const fn window(self) -> usize {
        match self {
            Direction::MemoryToDevice => MM2S_OFFSET,
            Direction::DeviceToMemory => S2MM_OFFSET,
        }
    }

    /// Short channel name
    pub const fn name(self) -> &'static str {
        match self {
            Direction::MemoryToDevice => "mm2s",
            Direction::DeviceToMemory => "s2mm",
        }
    }

    /// Peripheral identifier reported for this channel
    pub const fn peripheral_id(self) -> u32 {
        match self {
            Direction::MemoryToDevice => PERIPHERAL_ID_BASE,
            Direction::DeviceToMemory => PERIPHERAL_ID_BASE | 1,
        }
    }
}

/// Width of the buffer address registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressWidth {
    /// Low address register only
    #[default]
    Bits32,
    /// Low and high address registers
    Bits64,
}

impl AddressWidth {
    /// Largest address this width can program
    pub const fn max_address(self) -> u64 {
        match self {
            AddressWidth::Bits32 => u32::MAX as u64,
            AddressWidth::Bits64 => u64::MAX,
        }
    }
}

// =============================================================================
// Polling
// =============================================================================

/// Retry budget for one bounded register wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollConfig {
    /// Delays taken before giving up
    pub retries: u32,
    /// Delay between polls in microseconds
    pub interval_us: u32,
}

impl PollConfig {
    /// Create a budget
    #[must_use]
    pub const fn new(retries: u32, interval_us: u32) -> Self {
        Self {
            retries,
            interval_us,
        }
    }

    /// Total wait in microseconds before a timeout is reported
    pub const fn timeout_us(&self) -> u64 {
        self.retries as u64 * self.interval_us as u64
    }
}

// =============================================================================
// Channel State
// =============================================================================

/// Hardware-facing state of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelState {
    /// No transfer programmed
    #[default]
    Idle,
    /// One transfer programmed into the hardware
    Busy,
    /// Error interrupt or register timeout; next submission resets the core
    Error,
}

// =============================================================================
// Channel Configuration
// =============================================================================

/// Per-channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelConfig {
    /// Channel direction
    pub direction: Direction,
    /// Address register width
    pub address_width: AddressWidth,
    /// Interrupt line, informational
    pub irq: Option<u32>,
    /// Wait for HALTED to clear after setting run
    pub start_poll: PollConfig,
    /// Wait for HALTED after clearing run
    pub halt_poll: PollConfig,
    /// Wait for the soft reset bit to clear
    pub reset_poll: PollConfig,
}

impl ChannelConfig {
    /// Create a configuration with default timing for `direction`
    #[must_use]
    pub const fn new(direction: Direction) -> Self {
        Self {
            direction,
            address_width: AddressWidth::Bits32,
            irq: None,
            start_poll: PollConfig::new(START_POLL_RETRIES, POLL_INTERVAL_US),
            halt_poll: PollConfig::new(HALT_POLL_RETRIES, POLL_INTERVAL_US),
            reset_poll: PollConfig::new(RESET_POLL_RETRIES, RESET_POLL_INTERVAL_US),
        }
    }

    // =========================================================================
    // Builder Methods
    // =========================================================================

    /// Set the address register width
    #[must_use]
    pub const fn with_address_width(mut self, width: AddressWidth) -> Self {
        self.address_width = width;
        self
    }

    /// Record the interrupt line
    #[must_use]
    pub const fn with_irq(mut self, irq: u32) -> Self {
        self.irq = Some(irq);
        self
    }

    /// Set the start budget
    #[must_use]
    pub const fn with_start_poll(mut self, poll: PollConfig) -> Self {
        self.start_poll = poll;
        self
    }

    /// Set the halt budget
    #[must_use]
    pub const fn with_halt_poll(mut self, poll: PollConfig) -> Self {
        self.halt_poll = poll;
        self
    }

    /// Set the soft reset budget
    #[must_use]
    pub const fn with_reset_poll(mut self, poll: PollConfig) -> Self {
        self.reset_poll = poll;
        self
    }
}

// =============================================================================
// Stream Configuration
// =============================================================================

/// How a read behaves when no completed unit is available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReadMode {
    /// Wait for a completion
    #[default]
    Blocking,
    /// Fail with `WouldBlock`
    NonBlocking,
}

/// Streaming reader configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StreamConfig {
    /// Read behaviour on an empty completed list
    pub read_mode: ReadMode,
    /// Bytes requested per transfer; `None` uses the full buffer
    pub transfer_len: Option<u32>,
}

impl StreamConfig {
    /// Create a configuration with blocking reads and full-buffer transfers
    #[must_use]
    pub const fn new() -> Self {
        Self {
            read_mode: ReadMode::Blocking,
            transfer_len: None,
        }
    }

    /// Set the read mode
    #[must_use]
    pub const fn with_read_mode(mut self, mode: ReadMode) -> Self {
        self.read_mode = mode;
        self
    }

    /// Request `len` bytes per transfer instead of the full buffer
    #[must_use]
    pub const fn with_transfer_len(mut self, len: u32) -> Self {
        self.transfer_len = Some(len);
        self
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
