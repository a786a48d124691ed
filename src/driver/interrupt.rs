//! Interrupt dispatch for eDMA completion and error interrupts.
//!
//! Three entry points exist, one per interrupt topology:
//!
//! - [`DmaController::on_combined_interrupt`] for lines shared by a whole
//!   controller or by one 16-channel group. Each call services at most the
//!   lowest pending channel; a level-sensitive line re-enters for the rest.
//! - [`DmaController::on_channel_interrupt`] for a channel with its own line.
//! - [`DmaController::on_error_interrupt`] for the controller error line.
//!
//! A pending flag is always acknowledged before the notification runs, so a
//! completion raised from inside the notification is not lost.

use core::ops::Range;

use super::classify::{ErrorKind, ErrorStatus, classify, classify_channel};
use super::config::{ErrorNotification, IrqRouting};
use super::controller::DmaController;
use super::engine::{DmaInstance, LogicChannel};
use crate::constants::CHANNELS_PER_GROUP;
use crate::error::Result;
use crate::register::RegisterAccess;
use crate::register::edma::CMD_ALL;

// =============================================================================
// Events
// =============================================================================

/// Which completion point raised a channel interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferEvent {
    /// Major loop completed
    Major,
    /// Major loop half completed
    Half,
}

/// Channel completion event passed to a channel notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelEvent {
    /// Controller that raised the interrupt
    pub instance: DmaInstance,
    /// Hardware channel
    pub channel: u8,
    /// Logic channel mapped onto it
    pub logic: Option<LogicChannel>,
    /// Completion point
    pub kind: TransferEvent,
}

/// Classified controller error passed to error notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorEvent {
    /// Controller that raised the interrupt
    pub instance: DmaInstance,
    /// Channel named by the error status, if valid
    pub channel: Option<u8>,
    /// Logic channel mapped onto that channel
    pub logic: Option<LogicChannel>,
    /// Classification
    pub kind: ErrorKind,
    /// Decoded status as read before acknowledgement
    pub status: ErrorStatus,
}

// =============================================================================
// Pending channel sets
// =============================================================================

/// Channels covered by a combined interrupt line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CombinedGroup {
    /// Every channel of the controller
    Controller,
    /// One 16-channel group
    Group(u8),
}

impl CombinedGroup {
    /// Channel range of this line on a controller with `channels` channels,
    /// or `None` if the group does not exist
    #[must_use]
    pub fn channels(self, channels: usize) -> Option<Range<usize>> {
        match self {
            Self::Controller => Some(0..channels),
            Self::Group(group) => {
                let start = usize::from(group) * CHANNELS_PER_GROUP;
                (start < channels).then(|| start..start + CHANNELS_PER_GROUP)
            }
        }
    }
}

/// Set of channels with a pending flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PendingChannels(pub u64);

impl PendingChannels {
    /// Keep only the channels in `range`
    #[must_use]
    pub fn within(self, range: Range<usize>) -> Self {
        let mask = range.fold(0u64, |mask, channel| mask | (1 << channel));
        Self(self.0 & mask)
    }

    /// Remove `channels`
    #[must_use]
    pub const fn without(self, channels: u64) -> Self {
        Self(self.0 & !channels)
    }

    /// Lowest pending channel
    #[must_use]
    pub const fn lowest(self) -> Option<usize> {
        if self.0 == 0 {
            None
        } else {
            Some(self.0.trailing_zeros() as usize)
        }
    }

    /// Whether `channel` is pending
    #[must_use]
    pub const fn contains(self, channel: usize) -> bool {
        channel < 64 && self.0 & (1 << channel) != 0
    }

    /// No channel pending
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

// =============================================================================
// Dispatch
// =============================================================================

impl<R: RegisterAccess> DmaController<R> {
    /// Channels whose completion interrupt has a dedicated line
    fn separated_channels(&self) -> u64 {
        self.slots[..self.channels]
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.routing == IrqRouting::Separated)
            .fold(0, |mask, (channel, _)| mask | (1 << channel))
    }

    /// Pending completion interrupts
    #[must_use]
    pub fn pending_interrupts(&self) -> PendingChannels {
        PendingChannels(self.regs.interrupt_requests()).within(0..self.channels)
    }

    /// Acknowledge `channel` and notify if it has a completion interrupt
    /// enabled. Returns whether a notification ran.
    fn service(&self, channel: usize) -> bool {
        self.regs.clear_interrupt_request(channel as u8);

        let flags = self.flags(channel);
        if !flags.interrupts_enabled() {
            trace!("edma {} channel {} acknowledged", self.instance.0, channel);
            return false;
        }

        let slot = &self.slots[channel];
        let event = ChannelEvent {
            instance: self.instance,
            channel: channel as u8,
            logic: slot.logic,
            kind: if flags.done {
                TransferEvent::Major
            } else {
                TransferEvent::Half
            },
        };
        match slot.notification {
            Some(notify) => {
                notify(event);
                true
            }
            None => false,
        }
    }

    /// Service a combined completion interrupt line.
    ///
    /// Acknowledges the lowest pending channel of `group`, skipping channels
    /// routed to a dedicated line, and returns it.
    pub fn on_combined_interrupt(&self, group: CombinedGroup) -> Option<usize> {
        let range = group.channels(self.channels)?;
        let channel = self
            .pending_interrupts()
            .within(range)
            .without(self.separated_channels())
            .lowest()?;
        self.service(channel);
        Some(channel)
    }

    /// Service the dedicated completion line of `channel`.
    ///
    /// Returns whether a notification ran.
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`](crate::error::ChannelError::InvalidChannel).
    pub fn on_channel_interrupt(&self, channel: usize) -> Result<bool> {
        let channel = self.check(channel)?;
        Ok(self.service(channel))
    }

    /// Service the controller error line.
    ///
    /// Reports one error per call. The channel named by the error status is
    /// taken if its ERR bit is latched, otherwise the lowest latched channel.
    /// Only that channel's ERR bit is cleared, so further latched channels
    /// keep the line asserted and are reported by later calls. A channel
    /// that is latched but not named by the status classifies as a hardware
    /// inconsistency, since the status word describes another channel.
    ///
    /// The controller's error notification runs after the acknowledge,
    /// followed by `diagnostic`. Returns `None` if no error was latched.
    pub fn on_error_interrupt(&self, diagnostic: Option<ErrorNotification>) -> Option<ErrorEvent> {
        let status = ErrorStatus::from_raw(self.regs.error_status());
        let latched = PendingChannels(self.regs.error_requests()).within(0..self.channels);
        if !status.any() && !status.valid && latched.is_empty() {
            return None;
        }

        let named = status
            .valid
            .then_some(usize::from(status.channel))
            .filter(|&channel| channel < self.channels);
        let channel = named
            .filter(|&channel| latched.contains(channel))
            .or_else(|| latched.lowest())
            .or(named);
        match channel {
            Some(channel) => self.regs.clear_error(channel as u8),
            None => self.regs.clear_error(CMD_ALL),
        }

        let kind = match channel {
            Some(channel) if self.memory_sync_flagged(channel) => ErrorKind::MemorySyncError,
            Some(channel) if latched.contains(channel) => {
                classify_channel(&status, channel, true, false)
            }
            _ => classify(&status),
        };
        let event = ErrorEvent {
            instance: self.instance,
            channel: channel.map(|channel| channel as u8),
            logic: channel.and_then(|channel| self.logic_channel(channel)),
            kind,
            status,
        };

        error!(
            "edma {} channel {} error: {}",
            self.instance.0,
            channel.unwrap_or(usize::from(status.channel)),
            kind.as_str()
        );
        if let Some(notify) = self.error_notification {
            notify(event);
        }
        if let Some(hook) = diagnostic {
            hook(event);
        }
        Some(event)
    }
}
