//! Transfer requests, cookies and completion records.
//!
//! A [`TransferRequest`] describes one contiguous buffer. Submitting it to a
//! channel yields a [`Cookie`] that identifies the transfer in later status
//! queries. Once the hardware finishes, the deferred completion pass hands a
//! [`Completion`] to the registered handler.

use core::num::NonZeroU32;
use core::sync::atomic::AtomicU32;

use crate::driver::config::Direction;
use crate::driver::error::{DmaError, DmaResult};
use crate::internal::constants::COOKIE_MAX;

// =============================================================================
// Cookie
// =============================================================================

/// Identifier assigned to a descriptor at submission.
///
/// Always in `1..=0x7FFF_FFFF`; zero is never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Cookie(NonZeroU32);

impl Cookie {
    /// First cookie handed out by a fresh channel
    pub const FIRST: Cookie = Cookie(NonZeroU32::MIN);

    /// Wrap a raw value, rejecting reserved values.
    pub const fn new(raw: u32) -> Option<Self> {
        if raw > COOKIE_MAX {
            return None;
        }
        match NonZeroU32::new(raw) {
            Some(value) => Some(Cookie(value)),
            None => None,
        }
    }

    /// Raw cookie value
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// Cookie following this one, wrapping past the maximum to [`Cookie::FIRST`].
    #[must_use]
    pub const fn next(self) -> Self {
        if self.0.get() >= COOKIE_MAX {
            return Self::FIRST;
        }
        match NonZeroU32::new(self.0.get() + 1) {
            Some(value) => Cookie(value),
            None => Self::FIRST,
        }
    }
}

/// Opaque value handed back to the completion handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CallbackArg(pub usize);

// =============================================================================
// Transfer Request
// =============================================================================

/// One contiguous DMA buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Segment {
    /// Bus address of the buffer
    pub addr: u64,
    /// Length in bytes
    pub len: u32,
}

impl Segment {
    /// Create a segment
    pub const fn new(addr: u64, len: u32) -> Self {
        Self { addr, len }
    }
}

/// A single-buffer transfer to submit to a channel.
#[derive(Debug, Clone, Copy)]
pub struct TransferRequest {
    direction: Direction,
    segment: Segment,
    callback: Option<CallbackArg>,
    length_sink: Option<&'static AtomicU32>,
}

impl TransferRequest {
    /// Request a transfer of `len` bytes at bus address `addr`.
    pub const fn single(direction: Direction, addr: u64, len: u32) -> Self {
        Self {
            direction,
            segment: Segment::new(addr, len),
            callback: None,
            length_sink: None,
        }
    }

    /// Build from a segment list. Only a single segment is accepted.
    pub fn from_segments(direction: Direction, segments: &[Segment]) -> DmaResult<Self> {
        match segments {
            [segment] => Ok(Self::single(direction, segment.addr, segment.len)),
            _ => Err(DmaError::MultiSegment),
        }
    }

    /// Run the completion handler with `arg` once this transfer finishes.
    #[must_use]
    pub const fn with_callback(mut self, arg: CallbackArg) -> Self {
        self.callback = Some(arg);
        self
    }

    /// Store the transferred byte count in `sink` at completion.
    ///
    /// The sink is zeroed when the request is accepted.
    #[must_use]
    pub const fn with_length_sink(mut self, sink: &'static AtomicU32) -> Self {
        self.length_sink = Some(sink);
        self
    }

    /// Requested direction
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// Buffer segment
    pub const fn segment(&self) -> Segment {
        self.segment
    }

    /// Callback argument, if any
    pub const fn callback(&self) -> Option<CallbackArg> {
        self.callback
    }

    pub(crate) const fn length_sink(&self) -> Option<&'static AtomicU32> {
        self.length_sink
    }
}

// =============================================================================
// Status and Completion
// =============================================================================

/// How a finished descriptor ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// Hardware finished within the requested length
    Success,
    /// Hardware reported more bytes than requested
    LengthOverrun,
    /// Descriptor was active when the core was reset
    Aborted,
}

impl Outcome {
    /// True for [`Outcome::Success`]
    pub const fn is_success(self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// Result of a status query by cookie
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferStatus {
    /// Programmed into the hardware; `residue` bytes still outstanding
    InProgress {
        /// Requested minus transferred so far
        residue: u32,
    },
    /// Accepted but not yet started
    Queued,
    /// Finished successfully
    Complete {
        /// Requested minus transferred
        residue: u32,
    },
    /// Finished with a length violation or aborted by reset
    Error,
    /// Unknown cookie, or aged out of the history window
    NotFound,
}

/// Snapshot of a finished descriptor passed to the completion handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Completion {
    /// Descriptor cookie
    pub cookie: Cookie,
    /// Bytes requested
    pub requested: u32,
    /// Bytes the hardware reported
    pub transferred: u32,
    /// How it ended
    pub outcome: Outcome,
    /// Callback argument from the request
    pub arg: Option<CallbackArg>,
}

impl Completion {
    /// Requested minus transferred, saturating at zero
    pub const fn residue(&self) -> u32 {
        self.requested.saturating_sub(self.transferred)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
