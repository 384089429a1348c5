//! Core driver components for AXI DMA channels in direct-register mode.
//!
//! - [`config`] - Channel and stream configuration with builder methods
//! - [`error`] - Error types and result aliases
//! - [`descriptor`] - Transfer requests, cookies and completion records
//! - [`channel`] - The per-direction channel engine and interrupt top half
//! - [`completion`] - The deferred completion handler interface
//! - [`pool`] - Caller-owned DMA buffer storage
//! - [`stream`] - The streaming reader built on a device-to-memory channel
//!
//! # Example
//!
//! ```ignore
//! use axi_dma_dr::driver::{ChannelConfig, Direction, TransferRequest};
//!
//! let config = ChannelConfig::new(Direction::MemoryToDevice).with_irq(61);
//! let request = TransferRequest::single(Direction::MemoryToDevice, 0x1000_0000, 1500);
//! ```

// Submodules
pub mod channel;
pub mod completion;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod interrupt;
pub mod pool;
pub mod stream;

// Re-exports for convenience
pub use channel::{Channel, ChannelStats};
pub use completion::{CompletionHandler, IgnoreCompletions};
pub use config::{
    AddressWidth, ChannelConfig, ChannelState, Direction, PollConfig, ReadMode, StreamConfig,
};
pub use descriptor::{
    CallbackArg, Completion, Cookie, Outcome, Segment, TransferRequest, TransferStatus,
};
pub use error::{ConfigError, ConfigResult, DmaError, DmaResult, Error, IoError, IoResult, Result};
pub use interrupt::{InterruptStatus, IrqReturn};
pub use pool::{DmaBuffer, DmaPool};
pub use stream::{PoolCounts, StreamChannel, StreamStats};
