//! AXI DMA direct-register mode register map
//!
//! Offsets are relative to the channel window; the MM2S window starts at
//! the core base and the S2MM window at base + 0x30. All accesses go
//! through a [`RegisterBlock`] so the same code runs against hardware and
//! the host simulator.

use crate::hal::mmio::RegisterBlock;

// =============================================================================
// Channel Windows
// =============================================================================

/// MM2S (memory to device) channel window offset
pub const MM2S_OFFSET: usize = 0x00;

/// S2MM (device to memory) channel window offset
pub const S2MM_OFFSET: usize = 0x30;

// =============================================================================
// Register Offsets (within a channel window)
// =============================================================================

/// Channel control register
pub const CONTROL_OFFSET: usize = 0x00;

/// Channel status register
pub const STATUS_OFFSET: usize = 0x04;

/// Buffer address, low 32 bits
pub const ADDR_OFFSET: usize = 0x18;

/// Buffer address, high 32 bits (wide addressing only)
pub const ADDR_MSB_OFFSET: usize = 0x1C;

/// Bytes-to-transfer; writing it starts the transfer, reading it returns
/// the transferred count once the transfer finished
pub const LENGTH_OFFSET: usize = 0x28;

// =============================================================================
// Control Register Bits
// =============================================================================

/// Control register bits
pub mod control {
    /// Run (1) / stop (0)
    pub const RUN_STOP: u32 = 1 << 0;
    /// Soft reset, self-clearing; resets both channels of the core
    pub const RESET: u32 = 1 << 2;
    /// Completion interrupt enable
    pub const IOC_IRQ_EN: u32 = 1 << 12;
    /// Error interrupt enable
    pub const ERR_IRQ_EN: u32 = 1 << 14;
    /// Interrupts the driver services
    pub const IRQ_ALL: u32 = IOC_IRQ_EN | ERR_IRQ_EN;
}

// =============================================================================
// Status Register Bits
// =============================================================================

/// Status register bits
pub mod status {
    /// Channel halted
    pub const HALTED: u32 = 1 << 0;
    /// Channel idle
    pub const IDLE: u32 = 1 << 1;
    /// Completion interrupt (write 1 to clear)
    pub const IOC_IRQ: u32 = 1 << 12;
    /// Error interrupt (write 1 to clear)
    pub const ERR_IRQ: u32 = 1 << 14;
    /// Interrupt bits the driver services
    pub const IRQ_ALL: u32 = IOC_IRQ | ERR_IRQ;
}

// =============================================================================
// Register Access Macros
// =============================================================================

/// Generate read/write accessor methods for a channel register.
///
/// # Example
/// ```ignore
/// impl<B: RegisterBlock> ChannelRegs<B> {
///     reg_rw!(control, set_control, CONTROL_OFFSET, "Control register");
/// }
/// ```
macro_rules! reg_rw {
    ($read_fn:ident, $write_fn:ident, $offset:expr, $doc:expr) => {
        #[doc = concat!("Read ", $doc)]
        #[inline(always)]
        pub fn $read_fn(&self) -> u32 {
            self.block.read(self.window + $offset)
        }

        #[doc = concat!("Write ", $doc)]
        #[inline(always)]
        pub fn $write_fn(&self, value: u32) {
            self.block.write(self.window + $offset, value)
        }
    };
}

/// Generate set/clear methods for a control register bit.
macro_rules! reg_bit_ops {
    ($set_fn:ident, $clear_fn:ident, $offset:expr, $bit:expr, $what:expr) => {
        #[doc = concat!("Set ", $what)]
        #[inline(always)]
        pub fn $set_fn(&self) {
            self.block.modify(self.window + $offset, |v| v | $bit)
        }

        #[doc = concat!("Clear ", $what)]
        #[inline(always)]
        pub fn $clear_fn(&self) {
            self.block.modify(self.window + $offset, |v| v & !$bit)
        }
    };
}

// =============================================================================
// Channel Register Window
// =============================================================================

/// Typed accessors for one channel's register window.
#[derive(Debug)]
pub struct ChannelRegs<B> {
    block: B,
    window: usize,
}

impl<B: RegisterBlock> ChannelRegs<B> {
    /// Bind to the window at `window` inside `block`.
    pub const fn new(block: B, window: usize) -> Self {
        Self { block, window }
    }

    /// Give back the register block.
    pub fn into_block(self) -> B {
        self.block
    }

    reg_rw!(control, set_control, CONTROL_OFFSET, "control register");
    reg_rw!(status, write_status, STATUS_OFFSET, "status register");
    reg_rw!(length, set_length, LENGTH_OFFSET, "bytes-to-transfer register");

    reg_bit_ops!(set_run, clear_run, CONTROL_OFFSET, control::RUN_STOP, "run/stop bit");
    reg_bit_ops!(
        enable_irqs,
        disable_irqs,
        CONTROL_OFFSET,
        control::IRQ_ALL,
        "completion and error interrupt enables"
    );

    /// Request a soft reset of the whole core.
    #[inline(always)]
    pub fn start_reset(&self) {
        self.block
            .modify(self.window + CONTROL_OFFSET, |v| v | control::RESET);
    }

    /// Acknowledge (write-1-to-clear) the given status bits.
    #[inline(always)]
    pub fn ack(&self, bits: u32) {
        self.write_status(bits & status::IRQ_ALL);
    }

    /// Channel reports HALTED.
    #[inline(always)]
    pub fn is_halted(&self) -> bool {
        self.status() & status::HALTED != 0
    }

    /// Soft reset still in progress.
    #[inline(always)]
    pub fn is_resetting(&self) -> bool {
        self.control() & control::RESET != 0
    }

    /// Program the buffer address; the high word is written only when `wide`.
    #[inline]
    pub fn set_address(&self, addr: u64, wide: bool) {
        self.block.write(self.window + ADDR_OFFSET, addr as u32);
        if wide {
            self.block
                .write(self.window + ADDR_MSB_OFFSET, (addr >> 32) as u32);
        }
    }
}
