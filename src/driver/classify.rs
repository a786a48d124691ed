//! Error status decoding and classification.
//!
//! [`ErrorStatus`] is a decoded copy of the controller's ES register.
//! [`classify`] reduces it to exactly one [`ErrorKind`], using the fixed
//! precedence ECC, bus, descriptor, priority, unrecognized.

use crate::register::edma::{
    ES_BUS_ERRORS, ES_CPE, ES_DAE, ES_DBE, ES_DESCRIPTOR_ERRORS, ES_DOE, ES_ECX, ES_ERRCHN,
    ES_GPE, ES_NCE, ES_PRIORITY_ERRORS, ES_SAE, ES_SBE, ES_SGE, ES_SOE, ES_UCE, ES_VLD,
};

/// Which side of a transfer saw a bus error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusSide {
    /// Error on a source read
    Source,
    /// Error on a destination write
    Destination,
}

/// Scope of a priority configuration error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PriorityScope {
    /// Two channels in one group share a priority
    Channel,
    /// Two groups share a priority
    Group,
}

/// Classified transfer error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    /// No error pending
    #[default]
    NoError,
    /// The channel's error flag disagrees with the error status register
    HardwareInconsistency,
    /// Uncorrectable ECC error
    EccError,
    /// Bus error on a source read or destination write
    BusError(BusSide),
    /// Descriptor configuration error (offsets, addresses, counts, scatter-gather)
    DescriptorError,
    /// Channel or group priority collision
    PriorityError(PriorityScope),
    /// Cache coherency failure reported by software
    MemorySyncError,
    /// Error reported but no known condition bit is set
    UnrecognizedError,
}

impl ErrorKind {
    /// Whether this is an actual error
    #[inline]
    #[must_use]
    pub const fn is_error(&self) -> bool {
        !matches!(self, ErrorKind::NoError)
    }

    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NoError => "no error",
            ErrorKind::HardwareInconsistency => "hardware status inconsistent",
            ErrorKind::EccError => "uncorrectable ECC error",
            ErrorKind::BusError(BusSide::Source) => "source bus error",
            ErrorKind::BusError(BusSide::Destination) => "destination bus error",
            ErrorKind::DescriptorError => "descriptor configuration error",
            ErrorKind::PriorityError(PriorityScope::Channel) => "channel priority error",
            ErrorKind::PriorityError(PriorityScope::Group) => "group priority error",
            ErrorKind::MemorySyncError => "memory synchronization error",
            ErrorKind::UnrecognizedError => "unrecognized error",
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded Error Status register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorStatus {
    /// Destination bus error
    pub destination_bus: bool,
    /// Source bus error
    pub source_bus: bool,
    /// Scatter/gather configuration error
    pub scatter_gather: bool,
    /// NBYTES/CITER configuration error
    pub count: bool,
    /// Destination offset error
    pub destination_offset: bool,
    /// Destination address error
    pub destination_address: bool,
    /// Source offset error
    pub source_offset: bool,
    /// Source address error
    pub source_address: bool,
    /// Channel that caused the most recent error
    pub channel: u8,
    /// Channel priority error
    pub channel_priority: bool,
    /// Group priority error
    pub group_priority: bool,
    /// Transfer was cancelled with error
    pub cancelled: bool,
    /// Uncorrectable ECC error
    pub ecc: bool,
    /// At least one channel error flag is set
    pub valid: bool,
}

impl ErrorStatus {
    /// Create from a raw ES register value
    #[inline]
    #[must_use]
    pub fn from_raw(raw: u32) -> Self {
        Self {
            destination_bus: raw & ES_DBE != 0,
            source_bus: raw & ES_SBE != 0,
            scatter_gather: raw & ES_SGE != 0,
            count: raw & ES_NCE != 0,
            destination_offset: raw & ES_DOE != 0,
            destination_address: raw & ES_DAE != 0,
            source_offset: raw & ES_SOE != 0,
            source_address: raw & ES_SAE != 0,
            channel: ES_ERRCHN.get(raw) as u8,
            channel_priority: raw & ES_CPE != 0,
            group_priority: raw & ES_GPE != 0,
            cancelled: raw & ES_ECX != 0,
            ecc: raw & ES_UCE != 0,
            valid: raw & ES_VLD != 0,
        }
    }

    /// Convert back to the raw register layout
    #[inline]
    #[must_use]
    pub fn to_raw(&self) -> u32 {
        let mut val = ES_ERRCHN.set(0, u32::from(self.channel));
        for (set, bit) in [
            (self.destination_bus, ES_DBE),
            (self.source_bus, ES_SBE),
            (self.scatter_gather, ES_SGE),
            (self.count, ES_NCE),
            (self.destination_offset, ES_DOE),
            (self.destination_address, ES_DAE),
            (self.source_offset, ES_SOE),
            (self.source_address, ES_SAE),
            (self.channel_priority, ES_CPE),
            (self.group_priority, ES_GPE),
            (self.cancelled, ES_ECX),
            (self.ecc, ES_UCE),
            (self.valid, ES_VLD),
        ] {
            if set {
                val |= bit;
            }
        }
        val
    }

    /// Whether any bus error bit is set
    #[inline]
    #[must_use]
    pub fn has_bus_error(&self) -> bool {
        self.to_raw() & ES_BUS_ERRORS != 0
    }

    /// Whether any descriptor configuration bit is set
    #[inline]
    #[must_use]
    pub fn has_descriptor_error(&self) -> bool {
        self.to_raw() & ES_DESCRIPTOR_ERRORS != 0
    }

    /// Whether any priority bit is set
    #[inline]
    #[must_use]
    pub fn has_priority_error(&self) -> bool {
        self.to_raw() & ES_PRIORITY_ERRORS != 0
    }

    /// Whether any condition bit is set
    #[inline]
    #[must_use]
    pub fn any(&self) -> bool {
        self.ecc
            || self.cancelled
            || self.has_bus_error()
            || self.has_descriptor_error()
            || self.has_priority_error()
    }
}

/// Reduce an error status to one classification.
///
/// Returns [`ErrorKind::NoError`] when neither a condition bit nor VLD is
/// set. Precedence when several conditions are latched together is ECC,
/// then bus, then descriptor, then priority; a status with only VLD or a
/// cancellation set is unrecognized.
#[must_use]
pub fn classify(status: &ErrorStatus) -> ErrorKind {
    if !status.any() && !status.valid {
        return ErrorKind::NoError;
    }
    if status.ecc {
        ErrorKind::EccError
    } else if status.source_bus {
        ErrorKind::BusError(BusSide::Source)
    } else if status.destination_bus {
        ErrorKind::BusError(BusSide::Destination)
    } else if status.has_descriptor_error() {
        ErrorKind::DescriptorError
    } else if status.channel_priority {
        ErrorKind::PriorityError(PriorityScope::Channel)
    } else if status.group_priority {
        ErrorKind::PriorityError(PriorityScope::Group)
    } else {
        ErrorKind::UnrecognizedError
    }
}

/// Classify the error state of one channel.
///
/// `memory_sync` is the software coherency flag and wins over any hardware
/// state. `error_flag` is the channel's bit in the ERR register; when it is
/// set, `status` must be valid and name `channel`, otherwise the hardware
/// state is inconsistent.
#[must_use]
pub fn classify_channel(
    status: &ErrorStatus,
    channel: usize,
    error_flag: bool,
    memory_sync: bool,
) -> ErrorKind {
    if memory_sync {
        return ErrorKind::MemorySyncError;
    }
    if !error_flag {
        return ErrorKind::NoError;
    }
    if !status.valid || usize::from(status.channel) != channel {
        return ErrorKind::HardwareInconsistency;
    }
    classify(status)
}
