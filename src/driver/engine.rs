//! Instance arena and logic channel front end.
//!
//! [`DmaEngine`] holds every initialized controller and multiplexer, indexed
//! by typed instance ids, and maps absolute [`LogicChannel`]s onto
//! `(controller, hardware channel)` pairs. Clients address channels by logic
//! id only; the hardware channel index is a board wiring detail.
//!
//! # Example
//!
//! ```ignore
//! static CONTROLLERS: [ControllerConfig; 1] = [ControllerConfig::new(DmaInstance(0), EDMA_BASE, 32)];
//! static CHANNELS: [ChannelConfig; 1] = [ChannelConfig::new(LogicChannel(0), DmaInstance(0), 4)
//!     .with_trigger(ChannelTrigger::Hardware)
//!     .with_notification(on_rx_done)];
//! static MUXES: [DmaMuxConfig; 1] = [DmaMuxConfig::new(MuxInstance(0), DMAMUX_BASE, 32)];
//! static BINDINGS: [MuxBindingConfig; 1] = [MuxBindingConfig::new(MuxInstance(0), 4, UART_RX)];
//!
//! let mut engine = DmaEngine::new();
//! engine.init(unsafe { Mmio::new() }, &DmaConfig::new(&CONTROLLERS, &CHANNELS, &MUXES, &BINDINGS))?;
//! engine.configure_tcd(LogicChannel(0), &attrs)?;
//! engine.start(LogicChannel(0))?;
//! ```

use embedded_hal::delay::DelayNs;

use super::channel::{ChannelState, ChannelStatus};
use super::classify::ErrorKind;
use super::config::{
    ChannelConfig, ChannelNotification, ControllerConfig, DmaConfig, DmaMuxConfig,
    ErrorNotification,
};
use super::controller::DmaController;
use super::dmamux::{DmaMux, MuxBinding};
use super::interrupt::{CombinedGroup, ErrorEvent};
use crate::constants::{MAX_DMA_INSTANCES, MAX_DMAMUX_INSTANCES, MAX_LOGIC_CHANNELS};
use crate::error::{ChannelError, ConfigError, Result, TcdError};
use crate::register::RegisterAccess;
use crate::tcd::{TcdAddress, TcdWords, TransferAttributes};

/// eDMA controller instance identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DmaInstance(pub u8);

/// DMAMUX instance identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MuxInstance(pub u8);

/// Absolute channel identifier used by clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LogicChannel(pub u8);

/// Generate a logic channel wrapper around a `&self` controller method
macro_rules! logic_op {
    ($(#[$doc:meta])* $name:ident($($arg:ident: $ty:ty),*) -> $ret:ty) => {
        $(#[$doc])*
        ///
        /// # Errors
        ///
        /// [`ChannelError::InvalidChannel`] or [`ChannelError::NotConfigured`]
        /// for an unknown logic channel, plus the errors of the controller
        /// operation.
        pub fn $name(&self, logic: LogicChannel $(, $arg: $ty)*) -> Result<$ret> {
            let (controller, channel) = self.resolve(logic)?;
            controller.$name(channel $(, $arg)*)
        }
    };
}

/// All controllers, multiplexers and logic channels of the system
#[derive(Debug)]
pub struct DmaEngine<R> {
    controllers: [Option<DmaController<R>>; MAX_DMA_INSTANCES],
    muxes: [Option<DmaMux<R>>; MAX_DMAMUX_INSTANCES],
    logic_map: [Option<(DmaInstance, u8)>; MAX_LOGIC_CHANNELS],
    diagnostic: Option<ErrorNotification>,
}

impl<R> DmaEngine<R> {
    /// Create an engine with nothing initialized
    #[must_use]
    pub const fn new() -> Self {
        Self {
            controllers: [const { None }; MAX_DMA_INSTANCES],
            muxes: [const { None }; MAX_DMAMUX_INSTANCES],
            logic_map: [None; MAX_LOGIC_CHANNELS],
            diagnostic: None,
        }
    }
}

impl<R> Default for DmaEngine<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RegisterAccess + Clone> DmaEngine<R> {
    // -------------------------------------------------------------------------
    // Initialization
    // -------------------------------------------------------------------------

    /// Apply a complete static configuration.
    ///
    /// Controllers first, then multiplexers, then logic channels, then
    /// multiplexer bindings. Stops at the first error; instances initialized
    /// before it stay initialized.
    ///
    /// # Errors
    ///
    /// Any error of [`init_controller`](Self::init_controller),
    /// [`init_mux`](Self::init_mux), [`init_channel`](Self::init_channel) or
    /// [`bind`](Self::bind).
    pub fn init(&mut self, bus: R, config: &DmaConfig<'_>) -> Result<()> {
        for controller in config.controllers {
            self.init_controller(bus.clone(), controller)?;
        }
        for mux in config.muxes {
            self.init_mux(bus.clone(), mux)?;
        }
        for channel in config.channels {
            self.init_channel(channel)?;
        }
        for binding in config.bindings {
            self.bind(
                usize::from(binding.channel),
                binding.instance,
                binding.source,
                binding.trigger,
            )?;
        }
        self.diagnostic = config.diagnostic;
        info!(
            "dma engine ready: {} controllers, {} channels, {} muxes",
            config.controllers.len(),
            config.channels.len(),
            config.muxes.len()
        );
        Ok(())
    }

    /// Initialize one controller
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidInstance`], [`ConfigError::AlreadyInitialized`]
    /// or any error of [`DmaController::init`].
    pub fn init_controller(&mut self, bus: R, config: &ControllerConfig) -> Result<()> {
        let slot = self
            .controllers
            .get_mut(usize::from(config.instance.0))
            .ok_or(ConfigError::InvalidInstance)?;
        if slot.is_some() {
            return Err(ConfigError::AlreadyInitialized.into());
        }
        *slot = Some(DmaController::init(bus, config)?);
        Ok(())
    }

    /// Initialize one multiplexer, resetting all its channels
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidInstance`], [`ConfigError::AlreadyInitialized`]
    /// or [`ConfigError::InvalidChannelCount`].
    pub fn init_mux(&mut self, bus: R, config: &DmaMuxConfig) -> Result<()> {
        let slot = self
            .muxes
            .get_mut(usize::from(config.instance.0))
            .ok_or(ConfigError::InvalidInstance)?;
        if slot.is_some() {
            return Err(ConfigError::AlreadyInitialized.into());
        }
        *slot = Some(DmaMux::init(bus, config.instance, config.base, config.channels)?);
        Ok(())
    }

    /// Reset every channel of a multiplexer and release the instance
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidInstance`] or [`ConfigError::NotInitialized`].
    pub fn deinit_mux(&mut self, instance: MuxInstance) -> Result<()> {
        let mux = self
            .muxes
            .get_mut(usize::from(instance.0))
            .ok_or(ConfigError::InvalidInstance)?
            .take()
            .ok_or(ConfigError::NotInitialized)?;
        mux.deinit();
        Ok(())
    }

    /// Map a logic channel onto its hardware channel and put it into a known
    /// disabled state.
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`] for a logic id or hardware channel out
    /// of range, [`ConfigError::DuplicateChannel`] if either side is already
    /// mapped, controller lookup errors, or any error of
    /// [`DmaController::init_channel`].
    pub fn init_channel(&mut self, config: &ChannelConfig) -> Result<()> {
        let logic = usize::from(config.logic.0);
        if logic >= MAX_LOGIC_CHANNELS {
            return Err(ChannelError::InvalidChannel.into());
        }
        let target = (config.instance, config.hardware_channel);
        if self.logic_map[logic].is_some() || self.logic_map.contains(&Some(target)) {
            warn!(
                "logic channel {} or dma {} channel {} already mapped",
                config.logic.0,
                config.instance.0,
                config.hardware_channel
            );
            return Err(ConfigError::DuplicateChannel.into());
        }

        let channel = usize::from(config.hardware_channel);
        let controller = self.controller_mut(config.instance)?;
        controller.init_channel(channel, config.priority, config.preemption, config.master_id)?;
        controller.assign_channel(
            channel,
            Some(config.logic),
            config.trigger,
            config.routing,
            config.notification,
        )?;
        if config.error_interrupt {
            controller.enable_error_interrupt(channel)?;
        }

        self.logic_map[logic] = Some(target);
        debug!(
            "logic channel {} mapped to dma {} channel {}",
            config.logic.0,
            config.instance.0,
            config.hardware_channel
        );
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------------

    /// Initialized controller `instance`
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidInstance`] or [`ConfigError::NotInitialized`].
    pub fn controller(&self, instance: DmaInstance) -> Result<&DmaController<R>> {
        self.controllers
            .get(usize::from(instance.0))
            .ok_or(ConfigError::InvalidInstance)?
            .as_ref()
            .ok_or_else(|| ConfigError::NotInitialized.into())
    }

    /// Initialized controller `instance`, mutably
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidInstance`] or [`ConfigError::NotInitialized`].
    pub fn controller_mut(&mut self, instance: DmaInstance) -> Result<&mut DmaController<R>> {
        self.controllers
            .get_mut(usize::from(instance.0))
            .ok_or(ConfigError::InvalidInstance)?
            .as_mut()
            .ok_or_else(|| ConfigError::NotInitialized.into())
    }

    /// Initialized multiplexer `instance`
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidInstance`] or [`ConfigError::NotInitialized`].
    pub fn mux(&self, instance: MuxInstance) -> Result<&DmaMux<R>> {
        self.muxes
            .get(usize::from(instance.0))
            .ok_or(ConfigError::InvalidInstance)?
            .as_ref()
            .ok_or_else(|| ConfigError::NotInitialized.into())
    }

    /// Controller and hardware channel a logic channel is mapped to
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`] or [`ChannelError::NotConfigured`].
    pub fn locate(&self, logic: LogicChannel) -> Result<(DmaInstance, usize)> {
        let (instance, channel) = self
            .logic_map
            .get(usize::from(logic.0))
            .ok_or(ChannelError::InvalidChannel)?
            .ok_or(ChannelError::NotConfigured)?;
        Ok((instance, usize::from(channel)))
    }

    fn resolve(&self, logic: LogicChannel) -> Result<(&DmaController<R>, usize)> {
        let (instance, channel) = self.locate(logic)?;
        Ok((self.controller(instance)?, channel))
    }

    fn resolve_mut(&mut self, logic: LogicChannel) -> Result<(&mut DmaController<R>, usize)> {
        let (instance, channel) = self.locate(logic)?;
        Ok((self.controller_mut(instance)?, channel))
    }

    /// Hardware channel of `next` on the same controller as `logic`
    fn link_target(&self, logic: LogicChannel, next: LogicChannel) -> Result<usize> {
        let (instance, _) = self.locate(logic)?;
        let (next_instance, next_channel) = self.locate(next)?;
        if instance != next_instance {
            warn!(
                "logic channel {} cannot link to {} on another controller",
                logic.0,
                next.0
            );
            return Err(TcdError::LinkAcrossControllers.into());
        }
        Ok(next_channel)
    }

    // -------------------------------------------------------------------------
    // Descriptor configuration
    // -------------------------------------------------------------------------

    /// Write the descriptor of `logic`
    ///
    /// # Errors
    ///
    /// Lookup errors or any error of [`DmaController::configure_tcd`].
    pub fn configure_tcd(&mut self, logic: LogicChannel, attrs: &TransferAttributes) -> Result<()> {
        let (controller, channel) = self.resolve_mut(logic)?;
        controller.configure_tcd(channel, attrs)
    }

    /// Write the descriptor of `logic`, linking `next` after every minor
    /// loop and after the major loop
    ///
    /// # Errors
    ///
    /// Lookup errors, [`TcdError::LinkAcrossControllers`] or any error of
    /// [`DmaController::configure_linked_tcd`].
    pub fn configure_linked_tcd(
        &mut self,
        logic: LogicChannel,
        attrs: &TransferAttributes,
        next: LogicChannel,
    ) -> Result<()> {
        let next_channel = self.link_target(logic, next)?;
        let (controller, channel) = self.resolve_mut(logic)?;
        controller.configure_linked_tcd(channel, attrs, next_channel)
    }

    /// Write the descriptor of `logic`, loading `next` when the major loop
    /// completes
    ///
    /// # Errors
    ///
    /// Lookup errors or any error of
    /// [`DmaController::configure_scatter_gather_tcd`].
    pub fn configure_scatter_gather_tcd(
        &mut self,
        logic: LogicChannel,
        attrs: &TransferAttributes,
        next: TcdAddress,
    ) -> Result<()> {
        let (controller, channel) = self.resolve_mut(logic)?;
        controller.configure_scatter_gather_tcd(channel, attrs, next)
    }

    /// Scatter-gather combined with channel linking
    ///
    /// # Errors
    ///
    /// Lookup errors, [`TcdError::LinkAcrossControllers`] or any error of
    /// [`DmaController::configure_scatter_gather_linked_tcd`].
    pub fn configure_scatter_gather_linked_tcd(
        &mut self,
        logic: LogicChannel,
        attrs: &TransferAttributes,
        next: TcdAddress,
        next_logic: LogicChannel,
    ) -> Result<()> {
        let next_channel = self.link_target(logic, next_logic)?;
        let (controller, channel) = self.resolve_mut(logic)?;
        controller.configure_scatter_gather_linked_tcd(channel, attrs, next, next_channel)
    }

    /// Write a descriptor into memory for controller `instance`
    ///
    /// # Errors
    ///
    /// Lookup errors or any error of [`DmaController::configure_descriptor`].
    pub fn configure_descriptor(
        &self,
        instance: DmaInstance,
        address: TcdAddress,
        attrs: &TransferAttributes,
        next: Option<TcdAddress>,
    ) -> Result<()> {
        self.controller(instance)?
            .configure_descriptor(address, attrs, next)
    }

    /// Replace the completion notification of `logic`
    ///
    /// # Errors
    ///
    /// Lookup errors.
    pub fn set_notification(
        &mut self,
        logic: LogicChannel,
        notification: Option<ChannelNotification>,
    ) -> Result<()> {
        let (controller, channel) = self.resolve_mut(logic)?;
        controller.set_notification(channel, notification)
    }

    // -------------------------------------------------------------------------
    // Channel operations
    // -------------------------------------------------------------------------

    logic_op!(
        /// Change the arbitration priority, keeping preemption flags
        set_priority(priority: u8) -> ()
    );
    logic_op!(
        /// Start a transfer
        start() -> ()
    );
    logic_op!(
        /// Disable the request line
        stop() -> ()
    );
    logic_op!(
        /// Enable the request line
        set_hardware_request() -> ()
    );
    logic_op!(
        /// Disable the request line
        clear_hardware_request() -> ()
    );
    logic_op!(
        /// Enable the error interrupt
        enable_error_interrupt() -> ()
    );
    logic_op!(
        /// Disable the error interrupt
        disable_error_interrupt() -> ()
    );
    logic_op!(
        /// Clear DONE
        clear_done() -> ()
    );
    logic_op!(
        /// Clear the latched error and memory sync flag
        clear_error() -> ()
    );
    logic_op!(
        /// Record a software detected memory sync failure
        flag_memory_sync_error() -> ()
    );
    logic_op!(
        /// Whether the major loop completed
        is_completed() -> bool
    );

    /// Busy-wait until the transfer on `logic` completes
    ///
    /// # Errors
    ///
    /// Lookup errors or any error of [`DmaController::wait_for_completion`].
    pub fn wait_for_completion<D: DelayNs>(
        &self,
        logic: LogicChannel,
        delay: &mut D,
        timeout_us: u32,
    ) -> Result<()> {
        let (controller, channel) = self.resolve(logic)?;
        controller.wait_for_completion(channel, delay, timeout_us)
    }

    logic_op!(
        /// Whether the channel is executing
        is_active() -> bool
    );
    logic_op!(
        /// Classified error state
        get_channel_error_status() -> ErrorKind
    );
    logic_op!(
        /// Lifecycle state
        channel_state() -> ChannelState
    );
    logic_op!(
        /// Status snapshot
        channel_status() -> ChannelStatus
    );
    logic_op!(
        /// Major loop iterations left
        remaining_iterations() -> u16
    );
    logic_op!(
        /// Current source address
        source_address() -> u32
    );
    logic_op!(
        /// Current destination address
        destination_address() -> u32
    );
    logic_op!(
        /// Change the completion interrupt enables in place
        set_interrupt_flags(major: bool, half: bool) -> ()
    );
    logic_op!(
        /// Read back the descriptor
        read_tcd() -> TcdWords
    );

    // -------------------------------------------------------------------------
    // Multiplexer
    // -------------------------------------------------------------------------

    /// Route request `source` to `channel` of multiplexer `instance`
    ///
    /// # Errors
    ///
    /// Lookup errors or any error of [`DmaMux::bind`].
    pub fn bind(
        &self,
        channel: usize,
        instance: MuxInstance,
        source: u8,
        trigger: bool,
    ) -> Result<()> {
        self.mux(instance)?.bind(channel, source, trigger)
    }

    /// Reset `channel` of multiplexer `instance`
    ///
    /// # Errors
    ///
    /// Lookup errors or [`ChannelError::InvalidChannel`].
    pub fn unbind(&self, channel: usize, instance: MuxInstance) -> Result<()> {
        self.mux(instance)?.unbind(channel)
    }

    /// Binding of `channel` of multiplexer `instance`
    ///
    /// # Errors
    ///
    /// Lookup errors or [`ChannelError::InvalidChannel`].
    pub fn get_binding(&self, channel: usize, instance: MuxInstance) -> Result<MuxBinding> {
        self.mux(instance)?.get_binding(channel)
    }

    // -------------------------------------------------------------------------
    // Interrupt entry points
    // -------------------------------------------------------------------------

    /// Combined completion interrupt of controller `instance`
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidInstance`] or [`ConfigError::NotInitialized`].
    pub fn on_combined_interrupt(
        &self,
        instance: DmaInstance,
        group: CombinedGroup,
    ) -> Result<Option<usize>> {
        Ok(self.controller(instance)?.on_combined_interrupt(group))
    }

    /// Dedicated completion interrupt of `logic`
    ///
    /// # Errors
    ///
    /// Lookup errors.
    pub fn on_channel_interrupt(&self, logic: LogicChannel) -> Result<bool> {
        let (controller, channel) = self.resolve(logic)?;
        controller.on_channel_interrupt(channel)
    }

    /// Error interrupt of controller `instance`
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidInstance`] or [`ConfigError::NotInitialized`].
    pub fn on_error_interrupt(&self, instance: DmaInstance) -> Result<Option<ErrorEvent>> {
        Ok(self.controller(instance)?.on_error_interrupt(self.diagnostic))
    }

    /// Error interrupt shared by every controller; returns the number of
    /// controllers that had an error latched
    pub fn on_combined_error_interrupt(&self) -> usize {
        self.controllers
            .iter()
            .flatten()
            .filter_map(|controller| controller.on_error_interrupt(self.diagnostic))
            .count()
    }
}
