//! Hardware Abstraction Layer
//!
//! The thin layer between the channel engine and the silicon.
//!
//! # Modules
//!
//! - [`mmio`]: Register block access ([`RegisterBlock`], [`Mmio`])
//! - [`poll`]: Bounded register polling ([`Poller`])
//!
//! # Delay Integration
//!
//! All polling uses `embedded_hal::delay::DelayNs` directly. Pass any delay
//! implementation from your HAL.

pub mod mmio;
pub mod poll;

pub use mmio::{Mmio, RegisterBlock};
pub use poll::Poller;
