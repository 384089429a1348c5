//! AXI DMA Direct-Register Driver
//!
//! A `no_std`, `no_alloc` Rust driver for the Xilinx AXI DMA core operated in
//! direct-register (simple) mode, plus a streaming reader that turns a
//! continuous run of device-to-memory transfers into discrete units.
//!
//! # Architecture
//!
//! The driver is organized into three layers:
//!
//! 1. **Channel Layer** ([`driver::channel`]): One engine per direction with a
//!    pending queue, a single active transfer and a bounded completion history
//! 2. **Stream Layer** ([`driver::stream`]): A fixed pool of buffers cycled
//!    through the channel with a drop policy for slow consumers
//! 3. **HAL Layer** ([`hal`]): Register block access and bounded polling
//!
//! ## Execution Contexts
//!
//! - **Interrupt**: [`Channel::on_interrupt`] acknowledges status, finishes the
//!   active transfer, starts the next one and signals deferred work. It never
//!   calls user code and never waits.
//! - **Deferred**: [`Channel::process_completions`] runs completion handlers
//!   once each and trims the history. Re-entry is serialized.
//! - **Consumer**: [`StreamChannel::read`] and friends, from any thread or task.
//!
//! # Features
//!
//! - `defmt`: Enable defmt formatting and logging
//! - `log`: Log through the `log` facade
//! - `std`: Blocking reads that park the calling thread
//!
//! # Example
//!
//! ```ignore
//! use axi_dma_dr::{Channel, ChannelConfig, Direction, DmaPool, Mmio, StreamChannel, StreamConfig};
//!
//! axi_dma_dr::dma_pool_static!(POOL, 4, 4096);
//!
//! let core = unsafe { Mmio::new(0x4040_0000) };
//! let (tx, rx) = Channel::probe_pair(
//!     core,
//!     delay,
//!     ChannelConfig::new(Direction::MemoryToDevice),
//!     ChannelConfig::new(Direction::DeviceToMemory),
//! )?;
//!
//! let stream = StreamChannel::new(rx, &POOL, StreamConfig::new())?;
//! stream.activate()?;
//!
//! let mut unit = [0u8; 4096];
//! let len = stream.read(&mut unit).await?;
//! ```
//!
//! # Hardware Hazards
//!
//! - The soft reset is shared by both channels of a core. Resetting one
//!   channel (explicitly or on the first submit after an error) stops the
//!   other. Serialize resets across channels of the same core.
//! - A device-to-memory channel may not reach HALTED while its stream is
//!   idle, and a trailing burst may land in a buffer after
//!   [`Channel::terminate`] returns. Keep buffer memory alive for the life
//!   of the channel.

#![no_std]
#![deny(missing_docs)]
#![allow(unsafe_code)]
#![deny(unsafe_op_in_unsafe_fn)]
// Clippy lint levels, mirrored in Cargo.toml's [lints.clippy] table.
#![deny(clippy::correctness)]
#![warn(
    clippy::suspicious,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::cloned_instead_of_copied,
    clippy::explicit_iter_loop,
    clippy::implicit_clone,
    clippy::inconsistent_struct_constructor,
    clippy::manual_assert,
    clippy::manual_let_else,
    clippy::match_same_arms,
    clippy::needless_pass_by_value,
    clippy::semicolon_if_nothing_returned,
    clippy::uninlined_format_args,
    clippy::unnested_or_patterns,
    clippy::std_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::alloc_instead_of_core
)]
#![allow(
    clippy::mod_module_files,
    clippy::self_named_module_files,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::struct_excessive_bools,
    clippy::fn_params_excessive_bools,
    clippy::type_complexity,
    clippy::must_use_candidate,
    clippy::assertions_on_constants,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_lossless,
    clippy::panic_in_result_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::module_name_repetitions,
    clippy::wildcard_imports,
    clippy::items_after_statements,
    clippy::let_underscore_future
)]

// =============================================================================
// Modules
// =============================================================================

// Internal implementation details (pub(crate) only). Declared first so the
// logging macros are visible to every later module.
#[macro_use]
mod internal;

pub mod driver;
pub mod hal;
pub mod sync;

// Test utilities (only available during testing)
#[cfg(test)]
pub mod test_utils;

// =============================================================================
// Re-exports
// =============================================================================

pub use driver::channel::{Channel, ChannelStats};
pub use driver::completion::{CompletionHandler, IgnoreCompletions};
pub use driver::config::{
    AddressWidth, ChannelConfig, ChannelState, Direction, PollConfig, ReadMode, StreamConfig,
};
pub use driver::descriptor::{
    CallbackArg, Completion, Cookie, Outcome, Segment, TransferRequest, TransferStatus,
};
pub use driver::error::{
    ConfigError, ConfigResult, DmaError, DmaResult, Error, IoError, IoResult, Result,
};
pub use driver::interrupt::{InterruptStatus, IrqReturn};
pub use driver::pool::DmaPool;
pub use driver::stream::{PoolCounts, StreamChannel, StreamStats};
pub use hal::mmio::{Mmio, RegisterBlock};

/// Low-level register accessors for advanced use.
///
/// These are intentionally separated from the primary facade. Most users should
/// prefer the driver APIs instead of touching registers directly.
///
/// # Safety
///
/// Direct register access bypasses driver invariants. Writing the control
/// register of a channel owned by a [`Channel`] can desynchronize its queue
/// from the hardware.
pub mod unsafe_registers {
    pub use crate::internal::register::{
        ADDR_MSB_OFFSET, ADDR_OFFSET, CONTROL_OFFSET, ChannelRegs, LENGTH_OFFSET, MM2S_OFFSET,
        S2MM_OFFSET, STATUS_OFFSET, control, status,
    };
}

/// Shared driver constants.
///
/// These are grouped into a dedicated module to keep the top-level facade
/// focused on driver types.
pub mod constants {
    pub use crate::internal::constants::{
        // Identifiers
        COOKIE_MAX,
        COOKIE_MIN,
        // Storage
        DEFAULT_DESCRIPTOR_SLOTS,
        DEFAULT_MAX_PACKET_LEN,
        DEFAULT_POOL_SIZE,
        // Timing
        HALT_POLL_RETRIES,
        HISTORY_DEPTH,
        PERIPHERAL_ID_BASE,
        PIPELINE_DEPTH,
        POLL_INTERVAL_US,
        READER_WAIT_SLOTS,
        RESET_POLL_INTERVAL_US,
        RESET_POLL_RETRIES,
        START_POLL_RETRIES,
    };
}

// =============================================================================
// Macro Helpers
// =============================================================================

/// Declare a static DMA buffer pool for a [`StreamChannel`].
///
/// Extra attributes (for example a `link_section` placing the pool in
/// DMA-reachable memory) are passed through to the static.
///
/// # Examples
///
/// ```ignore
/// axi_dma_dr::dma_pool_static!(POOL);
/// axi_dma_dr::dma_pool_static!(#[unsafe(link_section = ".dma")] RX_POOL, 8, 2048);
///
/// let stream = StreamChannel::new(rx, &RX_POOL, StreamConfig::new())?;
/// ```
#[macro_export]
macro_rules! dma_pool_static {
    ($(#[$meta:meta])* $name:ident) => {
        $crate::dma_pool_static!(
            $(#[$meta])* $name,
            $crate::constants::DEFAULT_POOL_SIZE,
            $crate::constants::DEFAULT_MAX_PACKET_LEN
        );
    };
    ($(#[$meta:meta])* $name:ident, $n:expr, $buf:expr) => {
        $(#[$meta])*
        static $name: $crate::DmaPool<{ $n }, { $buf }> = $crate::DmaPool::new();
    };
}
