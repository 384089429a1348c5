//! Error types for the AXI DMA channel driver
//!
//! Errors are organized by domain for better diagnostics:
//! - [`ConfigError`]: Probe and configuration failures
//! - [`DmaError`]: Transfer request and descriptor issues
//! - [`IoError`]: Runtime channel and stream-read failures
//!
//! The unified [`Error`] enum wraps all domain errors and is returned
//! by most driver methods.

// =============================================================================
// Configuration Errors
// =============================================================================

/// Configuration and probe errors
///
/// These errors occur while bringing a channel up or while binding a
/// streaming reader to a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Invalid configuration parameter
    InvalidConfig,
    /// Core reports a zero-width length register (scatter-gather build)
    UnsupportedMode,
    /// Buffer or transfer length exceeds the channel maximum
    BufferTooLarge,
    /// Channel direction does not suit the requested use
    WrongDirection,
    /// Software reset failed or timed out
    ResetFailed,
    /// Buffer pool lies above the channel's addressable range
    PoolOutOfRange,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ConfigError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConfigError::InvalidConfig => "invalid configuration",
            ConfigError::UnsupportedMode => "core not in direct-register mode",
            ConfigError::BufferTooLarge => "buffer exceeds channel maximum length",
            ConfigError::WrongDirection => "wrong channel direction",
            ConfigError::ResetFailed => "software reset failed",
            ConfigError::PoolOutOfRange => "buffer pool outside channel address range",
        }
    }
}

// =============================================================================
// DMA Errors
// =============================================================================

/// Transfer request and descriptor errors
///
/// These errors are returned when a request is rejected at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaError {
    /// No free descriptor slot for the request
    NoDescriptorsAvailable,
    /// Request direction differs from the channel direction
    DirectionMismatch,
    /// Request carries more than one segment
    MultiSegment,
    /// Zero-length request
    InvalidLength,
    /// Request length exceeds the discovered channel maximum
    TransferTooLarge,
    /// Buffer address does not fit the configured address width
    AddressOutOfRange,
}

impl core::fmt::Display for DmaError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DmaError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            DmaError::NoDescriptorsAvailable => "no descriptors available",
            DmaError::DirectionMismatch => "transfer direction mismatch",
            DmaError::MultiSegment => "only single-segment transfers are supported",
            DmaError::InvalidLength => "invalid transfer length",
            DmaError::TransferTooLarge => "transfer too large for channel",
            DmaError::AddressOutOfRange => "buffer address out of range",
        }
    }
}

// =============================================================================
// I/O Errors
// =============================================================================

/// Runtime channel and read errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IoError {
    /// Register poll timed out
    Timeout,
    /// Invalid state for operation (e.g., stream not active)
    InvalidState,
    /// Resource already in use
    Busy,
    /// Non-blocking read found no completed unit
    WouldBlock,
    /// Destination smaller than the oldest completed unit
    BufferTooSmall,
    /// Wait was cancelled before data arrived
    Interrupted,
    /// Copy to the destination failed
    CopyFailed,
}

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl IoError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            IoError::Timeout => "operation timed out",
            IoError::InvalidState => "invalid state for operation",
            IoError::Busy => "resource busy",
            IoError::WouldBlock => "operation would block",
            IoError::BufferTooSmall => "buffer too small for unit",
            IoError::Interrupted => "wait interrupted",
            IoError::CopyFailed => "copy to destination failed",
        }
    }
}

// =============================================================================
// Unified Error Type
// =============================================================================

/// This enum wraps all domain-specific errors for unified error handling.
///
/// Match on the inner domain error for specific handling:
/// ```ignore
/// match result {
///     Err(Error::Config(ConfigError::UnsupportedMode)) => { /* ... */ }
///     Err(Error::Dma(DmaError::NoDescriptorsAvailable)) => { /* ... */ }
///     Err(Error::Io(IoError::Timeout)) => { /* ... */ }
///     _ => {}
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Configuration error
    Config(ConfigError),
    /// DMA error
    Dma(DmaError),
    /// I/O error
    Io(IoError),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Config(e) => write!(f, "config: {}", e.as_str()),
            Error::Dma(e) => write!(f, "dma: {}", e.as_str()),
            Error::Io(e) => write!(f, "io: {}", e.as_str()),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<DmaError> for Error {
    fn from(e: DmaError) -> Self {
        Error::Dma(e)
    }
}

impl From<IoError> for Error {
    fn from(e: IoError) -> Self {
        Error::Io(e)
    }
}

/// Result type alias for channel operations
pub type Result<T> = core::result::Result<T, Error>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = core::result::Result<T, ConfigError>;

/// Result type alias for DMA operations
pub type DmaResult<T> = core::result::Result<T, DmaError>;

/// Result type alias for I/O operations
pub type IoResult<T> = core::result::Result<T, IoError>;

// =============================================================================
// Unit Tests
// =============================================================================
