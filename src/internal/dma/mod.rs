//! Descriptor bookkeeping
//!
//! Fixed-capacity storage for the channel engine and the streaming reader.
//! Every slot carries a list tag; list order comes from per-slot sequence
//! numbers, so moving a slot between lists never copies descriptors.
//!
//! - [`DescriptorArena`]: pending, active and completed descriptors of one channel
//! - [`TxPool`]: buffer slots of a streaming reader

mod arena;
mod slots;
mod txpool;

pub use arena::{Descriptor, DescriptorArena, SlotState};
pub use txpool::{Replacement, TxPool, TxState};
