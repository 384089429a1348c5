//! Synchronization and Concurrency Support
//!
//! - **Primitives** (`primitives`): Low-level synchronization types
//!   - [`CriticalSectionCell`] - ISR-safe interior mutability
//!   - [`AtomicWaker`] - Async waker storage for interrupts
//!   - [`WaitQueue`] - Fixed set of wakers woken together
//!
//! - **Signal** (`signal`): [`WorkSignal`], the handoff from the interrupt
//!   top half to the deferred completion pass
//!
//! - **Async Support** (`asynch`): futures returned by the channel and the
//!   streaming reader. With the `std` feature they are driven to completion
//!   on the calling thread by `futures-lite`.
//!
//! # Example
//!
//! ```ignore
//! use axi_dma_dr::sync::CriticalSectionCell;
//!
//! static COUNTER: CriticalSectionCell<u32> = CriticalSectionCell::new(0);
//!
//! #[interrupt]
//! fn DMA_IRQ() {
//!     COUNTER.with(|c| *c += 1);
//! }
//! ```

mod primitives;
mod signal;

pub mod asynch;

pub use asynch::{ReadFuture, ReadableFuture, WorkFuture};
pub use primitives::{AtomicWaker, CriticalSectionCell, WaitQueue};
pub use signal::WorkSignal;
