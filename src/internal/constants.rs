//! Centralized Constants
//!
//! Single source of truth for limits, timing and identifiers used by the
//! channel engine and the streaming reader.
//!
//! Register offsets and bit masks live in [`crate::internal::register`]
//! since they describe the hardware block rather than driver policy.

// =============================================================================
// Descriptor Bookkeeping
// =============================================================================

/// Completed descriptors retained per channel for status queries
pub const HISTORY_DEPTH: usize = 32;

/// Default descriptor slots per channel (history plus in-flight work)
pub const DEFAULT_DESCRIPTOR_SLOTS: usize = 48;

/// Largest cookie value before wrapping back to [`COOKIE_MIN`]
pub const COOKIE_MAX: u32 = 0x7FFF_FFFF;

/// First valid cookie; values below are reserved
pub const COOKIE_MIN: u32 = 1;

// =============================================================================
// Streaming Reader
// =============================================================================

/// Transactions kept queued to hardware while a stream is active
pub const PIPELINE_DEPTH: usize = 2;

/// Default number of transactions in a stream pool
pub const DEFAULT_POOL_SIZE: usize = 4;

/// Default per-transaction buffer size (1 MiB)
pub const DEFAULT_MAX_PACKET_LEN: usize = 1024 * 1024;

/// Readers that can wait on one stream at the same time
pub const READER_WAIT_SLOTS: usize = 4;

// =============================================================================
// Timing
// =============================================================================

/// Interval between register polls in microseconds
pub const POLL_INTERVAL_US: u32 = 1;

/// Polls while waiting for the channel to leave HALTED after RUN is set
pub const START_POLL_RETRIES: u32 = 1_000;

/// Polls while waiting for the channel to reach HALTED after RUN is cleared
pub const HALT_POLL_RETRIES: u32 = 1_000;

/// Interval between soft-reset polls in microseconds
pub const RESET_POLL_INTERVAL_US: u32 = 10;

/// Polls while waiting for the soft-reset bit to self-clear (~1 s)
pub const RESET_POLL_RETRIES: u32 = 100_000;

// =============================================================================
// Identification
// =============================================================================

/// Peripheral ID base, or-ed with the direction code (0 MM2S, 1 S2MM)
pub const PERIPHERAL_ID_BASE: u32 = 0x000A_3500;

/// Pattern written to the length register to discover its width
pub const LENGTH_PROBE_PATTERN: u32 = 0xFFFF_FFFF;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_cover_history_and_pipeline() {
        assert!(DEFAULT_DESCRIPTOR_SLOTS > HISTORY_DEPTH + PIPELINE_DEPTH);
    }

    #[test]
    fn cookie_range_is_positive_31_bit() {
        assert!(COOKIE_MIN > 0);
        assert_eq!(COOKIE_MAX, i32::MAX as u32);
    }

    #[test]
    fn pool_default_allows_pipeline() {
        assert!(DEFAULT_POOL_SIZE >= PIPELINE_DEPTH);
    }
}
