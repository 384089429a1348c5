//! Interrupt status handling for an AXI DMA channel.
//!
//! This module provides the [`InterruptStatus`] structure for parsing the
//! channel status register and the [`IrqReturn`] verdict returned by the
//! interrupt top half.

use crate::internal::register::status::{ERR_IRQ, HALTED, IDLE, IOC_IRQ};

// =============================================================================
// Interrupt Status
// =============================================================================

/// Interrupt status flags parsed from the channel status register.
///
/// # Example
///
/// ```ignore
/// let status = InterruptStatus::from_raw(raw);
/// if status.has_error() {
///     // channel goes to ERROR, nothing else is processed
/// }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterruptStatus {
    /// Transfer complete (IOC)
    pub complete: bool,
    /// Channel error
    pub error: bool,
    /// Channel halted (informational, not acknowledged)
    pub halted: bool,
    /// Channel idle (informational, not acknowledged)
    pub idle: bool,
}

impl InterruptStatus {
    /// Create from raw status register value
    #[inline]
    pub fn from_raw(status: u32) -> Self {
        Self {
            complete: (status & IOC_IRQ) != 0,
            error: (status & ERR_IRQ) != 0,
            halted: (status & HALTED) != 0,
            idle: (status & IDLE) != 0,
        }
    }

    /// Convert to raw value for acknowledging (write-1-to-clear)
    ///
    /// Only the interrupt bits are included; HALTED and IDLE are read-only.
    #[inline]
    pub fn to_raw(&self) -> u32 {
        let mut val = 0u32;
        if self.complete {
            val |= IOC_IRQ;
        }
        if self.error {
            val |= ERR_IRQ;
        }
        val
    }

    /// Check if any serviced interrupt is pending
    #[inline]
    pub fn any(&self) -> bool {
        self.complete || self.error
    }

    /// Check if the error interrupt is pending
    #[inline]
    pub fn has_error(&self) -> bool {
        self.error
    }
}

// =============================================================================
// Interrupt Verdict
// =============================================================================

/// Result of running the interrupt top half
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IrqReturn {
    /// No serviced bit was set; the line belongs to someone else
    None,
    /// The interrupt was acknowledged and handled
    Handled,
}

impl IrqReturn {
    /// True when the interrupt was ours
    pub const fn is_handled(self) -> bool {
        matches!(self, IrqReturn::Handled)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
