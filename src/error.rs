//! Error types for the eDMA driver
//!
//! Errors are organized by domain for better diagnostics:
//! - [`ConfigError`]: Initialization and configuration table failures
//! - [`ChannelError`]: Channel lookups that do not resolve to hardware
//! - [`TcdError`]: Descriptor construction misuse (links, modulo, chains)
//!
//! The unified [`Error`] enum wraps all domain errors and is returned
//! by most driver methods.
//!
//! Hardware-reported transfer errors are not part of this module. They are
//! classified into [`ErrorKind`](crate::driver::classify::ErrorKind) and
//! delivered through status queries and notifications instead.

// =============================================================================
// Configuration Errors
// =============================================================================

/// Configuration and initialization errors
///
/// These errors occur while applying a static configuration table to the
/// controllers and multiplexers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Instance identifier out of range
    InvalidInstance,
    /// Instance already initialized
    AlreadyInitialized,
    /// Instance has not been initialized
    NotInitialized,
    /// Channel count is not 16, 32 or 64 (or exceeds the multiplexer limit)
    InvalidChannelCount,
    /// Logic or hardware channel assigned twice
    DuplicateChannel,
    /// Channel priority exceeds the 4-bit field
    InvalidPriority,
    /// Group priority exceeds the 2-bit field
    InvalidGroupPriority,
    /// Master ID exceeds the 4-bit field
    InvalidMasterId,
    /// DMAMUX source exceeds the 6-bit field
    InvalidSource,
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
            ConfigError::InvalidInstance => "invalid instance",
            ConfigError::AlreadyInitialized => "already initialized",
            ConfigError::NotInitialized => "not initialized",
            ConfigError::InvalidChannelCount => "unsupported channel count",
            ConfigError::DuplicateChannel => "channel assigned twice",
            ConfigError::InvalidPriority => "invalid channel priority",
            ConfigError::InvalidGroupPriority => "invalid group priority",
            ConfigError::InvalidMasterId => "invalid master ID",
            ConfigError::InvalidSource => "invalid request source",
        }
    }
}

// =============================================================================
// Channel Errors
// =============================================================================

/// Channel resolution errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelError {
    /// Channel index outside the controller or multiplexer width
    InvalidChannel,
    /// Logic channel has no hardware channel assigned
    NotConfigured,
    /// Transfer did not complete before the timeout
    Timeout,
    /// Channel latched a transfer error while being waited on
    Faulted,
}

impl core::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ChannelError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ChannelError::InvalidChannel => "invalid channel",
            ChannelError::NotConfigured => "channel not configured",
            ChannelError::Timeout => "transfer timed out",
            ChannelError::Faulted => "transfer error",
        }
    }
}

// =============================================================================
// Descriptor Errors
// =============================================================================

/// Transfer control descriptor construction errors
///
/// Raised at the call boundary, before any descriptor word is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TcdError {
    /// Source or destination modulo exceeds the 5-bit field
    InvalidModulo,
    /// Channel linked to itself
    SelfLink,
    /// Linked channel index not below the controller width
    LinkOutOfRange,
    /// Linked channel lives on another controller
    LinkAcrossControllers,
    /// Next descriptor address is null
    NullDescriptor,
    /// Next descriptor address is not 32-byte aligned
    MisalignedDescriptor,
    /// Next descriptor is the descriptor being written, or its chain leads back to it
    ScatterGatherCycle,
}

impl core::fmt::Display for TcdError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TcdError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            TcdError::InvalidModulo => "invalid address modulo",
            TcdError::SelfLink => "channel linked to itself",
            TcdError::LinkOutOfRange => "linked channel out of range",
            TcdError::LinkAcrossControllers => "linked channel on another controller",
            TcdError::NullDescriptor => "null scatter-gather descriptor",
            TcdError::MisalignedDescriptor => "misaligned scatter-gather descriptor",
            TcdError::ScatterGatherCycle => "scatter-gather chain would be cyclic",
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
///     Err(Error::Config(ConfigError::InvalidChannelCount)) => { /* ... */ }
///     Err(Error::Channel(ChannelError::NotConfigured)) => { /* ... */ }
///     Err(Error::Tcd(TcdError::SelfLink)) => { /* ... */ }
///     _ => {}
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Configuration error
    Config(ConfigError),
    /// Channel error
    Channel(ChannelError),
    /// Descriptor error
    Tcd(TcdError),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Config(e) => write!(f, "config: {}", e.as_str()),
            Error::Channel(e) => write!(f, "channel: {}", e.as_str()),
            Error::Tcd(e) => write!(f, "tcd: {}", e.as_str()),
        }
    }
}

// From impls for automatic conversion
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<ChannelError> for Error {
    fn from(e: ChannelError) -> Self {
        Error::Channel(e)
    }
}

impl From<TcdError> for Error {
    fn from(e: TcdError) -> Self {
        Error::Tcd(e)
    }
}

/// Result type alias for driver operations
pub type Result<T> = core::result::Result<T, Error>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = core::result::Result<T, ConfigError>;

/// Result type alias for descriptor operations
pub type TcdResult<T> = core::result::Result<T, TcdError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    extern crate std;
    use std::format;

    use super::*;

    #[test]
    fn config_error_as_str_non_empty() {
        let variants = [
            ConfigError::InvalidInstance,
            ConfigError::AlreadyInitialized,
            ConfigError::NotInitialized,
            ConfigError::InvalidChannelCount,
            ConfigError::DuplicateChannel,
            ConfigError::InvalidPriority,
            ConfigError::InvalidGroupPriority,
            ConfigError::InvalidMasterId,
            ConfigError::InvalidSource,
        ];

        for variant in variants {
            assert!(!variant.as_str().is_empty(), "ConfigError::{variant:?} has empty string");
        }
    }

    #[test]
    fn channel_error_as_str_non_empty() {
        let variants = [
            ChannelError::InvalidChannel,
            ChannelError::NotConfigured,
            ChannelError::Timeout,
            ChannelError::Faulted,
        ];

        for variant in variants {
            assert!(!variant.as_str().is_empty(), "ChannelError::{variant:?} has empty string");
        }
    }

    #[test]
    fn tcd_error_as_str_non_empty() {
        let variants = [
            TcdError::InvalidModulo,
            TcdError::SelfLink,
            TcdError::LinkOutOfRange,
            TcdError::LinkAcrossControllers,
            TcdError::NullDescriptor,
            TcdError::MisalignedDescriptor,
            TcdError::ScatterGatherCycle,
        ];

        for variant in variants {
            assert!(!variant.as_str().is_empty(), "TcdError::{variant:?} has empty string");
        }
    }

    #[test]
    fn config_error_display() {
        assert_eq!(format!("{}", ConfigError::InvalidPriority), "invalid channel priority");
    }

    #[test]
    fn tcd_error_display() {
        assert_eq!(format!("{}", TcdError::SelfLink), "channel linked to itself");
    }

    #[test]
    fn error_from_domain_errors() {
        assert_eq!(
            Error::from(ConfigError::InvalidInstance),
            Error::Config(ConfigError::InvalidInstance)
        );
        assert_eq!(
            Error::from(ChannelError::NotConfigured),
            Error::Channel(ChannelError::NotConfigured)
        );
        assert_eq!(Error::from(TcdError::LinkOutOfRange), Error::Tcd(TcdError::LinkOutOfRange));
    }

    #[test]
    fn error_display_carries_domain_prefix() {
        let display = format!("{}", Error::Tcd(TcdError::ScatterGatherCycle));
        assert!(display.starts_with("tcd:"));
        assert!(display.contains("cyclic"));

        let display = format!("{}", Error::Channel(ChannelError::InvalidChannel));
        assert!(display.starts_with("channel:"));
    }

    #[test]
    fn question_mark_converts_domain_errors() {
        fn link() -> Result<()> {
            Err(TcdError::SelfLink)?;
            Ok(())
        }

        assert_eq!(link(), Err(Error::Tcd(TcdError::SelfLink)));
    }
}
