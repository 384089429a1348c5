//! Internal Implementation Details
//!
//! This module contains implementation details that are not part of the public API.
//! Types in this module may change without notice between minor versions.
//!
//! # Contents
//!
//! - [`register`]: AXI DMA register map and typed channel accessors
//! - [`constants`]: Limits, timing and identifiers
//! - [`dma`]: Descriptor and transaction bookkeeping
//! - [`fmt`]: Logging shims over `log` / `defmt`
//!
//! # Stability
//!
//! **WARNING:** This module is `pub(crate)` only. Do not depend on any types
//! or functions in this module from external code. They are subject to change
//! without notice.

// Must come first so the macros are in scope for the rest of the crate
#[macro_use]
mod fmt;

pub(crate) mod constants;
pub(crate) mod dma;
pub(crate) mod register;
