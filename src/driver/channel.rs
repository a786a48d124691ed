//! Per-channel types: arbitration settings, state and status.

use super::classify::ErrorKind;
use crate::constants::{MAX_CHANNEL_PRIORITY, MAX_MASTER_ID};
use crate::error::{ConfigError, ConfigResult};
use crate::register::edma::{DCHMID_EMI, DCHMID_MID, DCHPRI_CHPRI, DCHPRI_DPA, DCHPRI_ECP};

/// Channel lifecycle state, derived from hardware flags and the software table.
///
/// ```text
/// Disabled -> Configured -> Armed -> Active -> Done
///                             |        |
///                             +--------+--> Error
/// ```
///
/// Reconfiguring, restarting or clearing the error returns a `Done` or
/// `Error` channel to `Configured` or `Armed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelState {
    /// No descriptor written since the channel was initialized
    #[default]
    Disabled,
    /// Descriptor written, no request pending
    Configured,
    /// Request enabled or software start pending
    Armed,
    /// Hardware is executing a minor loop
    Active,
    /// Major loop completed
    Done,
    /// Error latched for this channel
    Error,
}

/// Preemption behaviour of a channel within its group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Preemption {
    /// A higher priority channel may suspend this one
    pub can_be_preempted: bool,
    /// This channel may suspend a lower priority one
    pub can_preempt: bool,
}

impl Preemption {
    /// Neither preempts nor can be preempted
    pub const NONE: Self = Self::new(false, false);

    /// Create preemption flags
    #[must_use]
    pub const fn new(can_be_preempted: bool, can_preempt: bool) -> Self {
        Self {
            can_be_preempted,
            can_preempt,
        }
    }

    /// Encode into the ECP/DPA bits of a DCHPRI byte
    #[must_use]
    pub const fn to_bits(self) -> u8 {
        let mut bits = 0;
        if self.can_be_preempted {
            bits |= DCHPRI_ECP;
        }
        if !self.can_preempt {
            bits |= DCHPRI_DPA;
        }
        bits
    }

    /// Decode from a DCHPRI byte
    #[must_use]
    pub const fn from_bits(raw: u8) -> Self {
        Self {
            can_be_preempted: raw & DCHPRI_ECP != 0,
            can_preempt: raw & DCHPRI_DPA == 0,
        }
    }
}

/// Bus master ID replication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MasterId {
    /// Replicate `id` on the bus while the channel is active
    pub enable: bool,
    /// Master ID (0..=15)
    pub id: u8,
}

impl MasterId {
    /// Replication disabled
    pub const DISABLED: Self = Self { enable: false, id: 0 };

    /// Replicate `id`
    #[must_use]
    pub const fn replicate(id: u8) -> Self {
        Self { enable: true, id }
    }

    /// Encode into a DCHMID byte
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidMasterId`] if `id` exceeds 4 bits.
    pub const fn to_bits(self) -> ConfigResult<u8> {
        if self.id > MAX_MASTER_ID {
            return Err(ConfigError::InvalidMasterId);
        }
        let mut bits = DCHMID_MID.set(0, self.id as u32) as u8;
        if self.enable {
            bits |= DCHMID_EMI;
        }
        Ok(bits)
    }

    /// Decode from a DCHMID byte
    #[must_use]
    pub const fn from_bits(raw: u8) -> Self {
        Self {
            enable: raw & DCHMID_EMI != 0,
            id: DCHMID_MID.get(raw as u32) as u8,
        }
    }
}

/// Encode a DCHPRI byte
///
/// # Errors
///
/// [`ConfigError::InvalidPriority`] if `priority` exceeds 4 bits.
pub const fn encode_priority(priority: u8, preemption: Preemption) -> ConfigResult<u8> {
    if priority > MAX_CHANNEL_PRIORITY {
        return Err(ConfigError::InvalidPriority);
    }
    Ok(DCHPRI_CHPRI.set(0, priority as u32) as u8 | preemption.to_bits())
}

/// Snapshot of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelStatus {
    /// Lifecycle state
    pub state: ChannelState,
    /// Major loop iterations left (CITER)
    pub remaining_iterations: u16,
    /// Hardware request enable (ERQ)
    pub request_enabled: bool,
    /// Peripheral request line asserted (HRS)
    pub hardware_request: bool,
    /// Interrupt request pending (INT)
    pub interrupt_pending: bool,
    /// Classified error
    pub error: ErrorKind,
}
