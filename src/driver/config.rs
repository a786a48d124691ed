//! Static configuration tables for controllers, channels and multiplexers.
//!
//! Everything here is `const`-constructible so a board's whole DMA setup can
//! live in `static` tables and be applied once with
//! [`DmaEngine::init`](super::engine::DmaEngine::init).

use super::channel::{MasterId, Preemption};
use super::engine::{DmaInstance, LogicChannel, MuxInstance};
use super::interrupt::{ChannelEvent, ErrorEvent};
use crate::register::Endian;
use crate::register::protect::Protection;

/// Notification invoked for a channel completion event
pub type ChannelNotification = fn(ChannelEvent);

/// Notification invoked for a controller error event
pub type ErrorNotification = fn(ErrorEvent);

/// How a channel is started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelTrigger {
    /// Started by software (SSRT)
    #[default]
    Software,
    /// Started by a peripheral request (SERQ enables the request line)
    Hardware,
}

/// Interrupt topology a channel's completion interrupt is wired to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IrqRouting {
    /// Shares a controller or group interrupt line with other channels
    #[default]
    Combined,
    /// Has a dedicated interrupt line
    Separated,
}

/// Controller initialization settings
#[derive(Debug, Clone, Copy)]
pub struct ControllerConfig {
    /// Instance identifier
    pub instance: DmaInstance,
    /// Register block base address
    pub base: usize,
    /// Number of channels (16, 32 or 64)
    pub channels: usize,
    /// Bus byte order
    pub endian: Endian,
    /// Whether channel priority bytes sit behind soft lock bits
    pub protection: Protection,
    /// Round robin arbitration between channels (instead of fixed priority)
    pub round_robin_channels: bool,
    /// Round robin arbitration between groups
    pub round_robin_groups: bool,
    /// Halt the controller when an error is detected
    pub halt_on_error: bool,
    /// Minor loop offset mapping
    pub minor_loop_mapping: bool,
    /// Continuous link mode
    pub continuous_link: bool,
    /// Stall new channel starts while the core is halted by a debugger
    pub debug_halt: bool,
    /// Priority of each 16-channel group (0..=3, should be unique)
    pub group_priorities: [u8; 4],
    /// Notification for errors on this controller
    pub error_notification: Option<ErrorNotification>,
}

impl ControllerConfig {
    /// Create a configuration with fixed-priority arbitration and default group priorities
    #[must_use]
    pub const fn new(instance: DmaInstance, base: usize, channels: usize) -> Self {
        Self {
            instance,
            base,
            channels,
            endian: Endian::Little,
            protection: Protection::Unprotected,
            round_robin_channels: false,
            round_robin_groups: false,
            halt_on_error: false,
            minor_loop_mapping: false,
            continuous_link: false,
            debug_halt: false,
            group_priorities: [0, 1, 2, 3],
            error_notification: None,
        }
    }

    /// Set the bus byte order
    #[must_use]
    pub const fn with_endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    /// Set the register protection mode
    #[must_use]
    pub const fn with_protection(mut self, protection: Protection) -> Self {
        self.protection = protection;
        self
    }

    /// Set round robin arbitration for channels and groups
    #[must_use]
    pub const fn with_round_robin(mut self, channels: bool, groups: bool) -> Self {
        self.round_robin_channels = channels;
        self.round_robin_groups = groups;
        self
    }

    /// Halt on error
    #[must_use]
    pub const fn with_halt_on_error(mut self, enabled: bool) -> Self {
        self.halt_on_error = enabled;
        self
    }

    /// Enable minor loop mapping
    #[must_use]
    pub const fn with_minor_loop_mapping(mut self, enabled: bool) -> Self {
        self.minor_loop_mapping = enabled;
        self
    }

    /// Enable continuous link mode
    #[must_use]
    pub const fn with_continuous_link(mut self, enabled: bool) -> Self {
        self.continuous_link = enabled;
        self
    }

    /// Stall while debugging
    #[must_use]
    pub const fn with_debug_halt(mut self, enabled: bool) -> Self {
        self.debug_halt = enabled;
        self
    }

    /// Set group priorities
    #[must_use]
    pub const fn with_group_priorities(mut self, priorities: [u8; 4]) -> Self {
        self.group_priorities = priorities;
        self
    }

    /// Set the error notification
    #[must_use]
    pub const fn with_error_notification(mut self, notification: ErrorNotification) -> Self {
        self.error_notification = Some(notification);
        self
    }
}

/// Logic channel assignment and initial settings
#[derive(Debug, Clone, Copy)]
pub struct ChannelConfig {
    /// Logic channel identifier used by clients
    pub logic: LogicChannel,
    /// Controller owning the hardware channel
    pub instance: DmaInstance,
    /// Hardware channel on that controller
    pub hardware_channel: u8,
    /// Arbitration priority within the channel's group
    pub priority: u8,
    /// Preemption flags
    pub preemption: Preemption,
    /// Master ID replication
    pub master_id: MasterId,
    /// How the channel is started
    pub trigger: ChannelTrigger,
    /// Completion interrupt topology
    pub routing: IrqRouting,
    /// Enable the error interrupt for this channel at init
    pub error_interrupt: bool,
    /// Completion notification
    pub notification: Option<ChannelNotification>,
}

impl ChannelConfig {
    /// Map `logic` onto `hardware_channel` of `instance`
    #[must_use]
    pub const fn new(logic: LogicChannel, instance: DmaInstance, hardware_channel: u8) -> Self {
        Self {
            logic,
            instance,
            hardware_channel,
            priority: 0,
            preemption: Preemption::NONE,
            master_id: MasterId::DISABLED,
            trigger: ChannelTrigger::Software,
            routing: IrqRouting::Combined,
            error_interrupt: false,
            notification: None,
        }
    }

    /// Set the arbitration priority
    #[must_use]
    pub const fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Set the preemption flags
    #[must_use]
    pub const fn with_preemption(mut self, preemption: Preemption) -> Self {
        self.preemption = preemption;
        self
    }

    /// Set master ID replication
    #[must_use]
    pub const fn with_master_id(mut self, master_id: MasterId) -> Self {
        self.master_id = master_id;
        self
    }

    /// Set the trigger kind
    #[must_use]
    pub const fn with_trigger(mut self, trigger: ChannelTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    /// Set the interrupt routing
    #[must_use]
    pub const fn with_routing(mut self, routing: IrqRouting) -> Self {
        self.routing = routing;
        self
    }

    /// Enable the channel's error interrupt
    #[must_use]
    pub const fn with_error_interrupt(mut self, enabled: bool) -> Self {
        self.error_interrupt = enabled;
        self
    }

    /// Set the completion notification
    #[must_use]
    pub const fn with_notification(mut self, notification: ChannelNotification) -> Self {
        self.notification = Some(notification);
        self
    }
}

/// Multiplexer instance settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DmaMuxConfig {
    /// Instance identifier
    pub instance: MuxInstance,
    /// Register block base address
    pub base: usize,
    /// Number of channel configuration bytes
    pub channels: usize,
}

impl DmaMuxConfig {
    /// Describe a multiplexer
    #[must_use]
    pub const fn new(instance: MuxInstance, base: usize, channels: usize) -> Self {
        Self {
            instance,
            base,
            channels,
        }
    }
}

/// Initial binding applied to a multiplexer channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MuxBindingConfig {
    /// Multiplexer instance
    pub instance: MuxInstance,
    /// Multiplexer channel
    pub channel: u8,
    /// Request source (0..=63)
    pub source: u8,
    /// Periodic trigger mode
    pub trigger: bool,
}

impl MuxBindingConfig {
    /// Bind `channel` of `instance` to `source`
    #[must_use]
    pub const fn new(instance: MuxInstance, channel: u8, source: u8) -> Self {
        Self {
            instance,
            channel,
            source,
            trigger: false,
        }
    }

    /// Enable periodic trigger mode
    #[must_use]
    pub const fn with_trigger(mut self, trigger: bool) -> Self {
        self.trigger = trigger;
        self
    }
}

/// Complete static configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct DmaConfig<'a> {
    /// Controllers to initialize
    pub controllers: &'a [ControllerConfig],
    /// Logic channel assignments
    pub channels: &'a [ChannelConfig],
    /// Multiplexers to initialize
    pub muxes: &'a [DmaMuxConfig],
    /// Multiplexer bindings applied after the multiplexers
    pub bindings: &'a [MuxBindingConfig],
    /// Diagnostic hook receiving every classified error
    pub diagnostic: Option<ErrorNotification>,
}

impl<'a> DmaConfig<'a> {
    /// Group configuration tables
    #[must_use]
    pub const fn new(
        controllers: &'a [ControllerConfig],
        channels: &'a [ChannelConfig],
        muxes: &'a [DmaMuxConfig],
        bindings: &'a [MuxBindingConfig],
    ) -> Self {
        Self {
            controllers,
            channels,
            muxes,
            bindings,
            diagnostic: None,
        }
    }

    /// Set the diagnostic hook
    #[must_use]
    pub const fn with_diagnostic(mut self, hook: ErrorNotification) -> Self {
        self.diagnostic = Some(hook);
        self
    }
}
