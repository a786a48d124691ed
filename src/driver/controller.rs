//! eDMA controller: channel manager and descriptor configuration.
//!
//! A [`DmaController`] owns one register block and the software side of its
//! channels (logic id, trigger kind, interrupt routing, notification). All
//! channel arguments here are hardware channel indices; the
//! [`DmaEngine`](super::engine::DmaEngine) maps logic channels onto them.
//!
//! Descriptor configuration requires the channel to be stopped. This is the
//! caller's responsibility and is not checked.

use core::cell::Cell;

use embedded_hal::delay::DelayNs;

use super::channel::{ChannelState, ChannelStatus, MasterId, Preemption, encode_priority};
use super::classify::{ErrorKind, ErrorStatus, classify_channel};
use super::config::{
    ChannelNotification, ChannelTrigger, ControllerConfig, ErrorNotification, IrqRouting,
};
use super::engine::{DmaInstance, LogicChannel};
use crate::constants::{
    COMPLETION_POLL_US, MAX_CHANNELS_PER_CONTROLLER, MAX_GROUP_PRIORITY, SUPPORTED_CHANNEL_COUNTS,
};
use crate::error::{ChannelError, ConfigError, ConfigResult, Result, TcdError, TcdResult};
use crate::register::edma::{
    CMD_ALL, CR_CLM, CR_CX, CR_ECX, CR_EDBG, CR_EMLM, CR_ERCA, CR_ERGA, CR_GRPPRI, CR_HALT,
    CR_HOE, DCHPRI_CHPRI, EdmaRegs,
};
use crate::register::protect::{Protection, protected_write8};
use crate::register::{Endian, RegisterAccess};
use crate::tcd::bits::{csr, word};
use crate::tcd::{
    TcdAddress, TcdFlags, TcdWords, TransferAttributes, iteration_count, validate_next,
};

/// Software state of one hardware channel
#[derive(Debug, Clone, Copy)]
pub(super) struct ChannelSlot {
    pub(super) logic: Option<LogicChannel>,
    pub(super) trigger: ChannelTrigger,
    pub(super) routing: IrqRouting,
    pub(super) notification: Option<ChannelNotification>,
    pub(super) configured: bool,
    /// First descriptor loaded by scatter-gather, as written at configuration
    pub(super) chain_head: Option<TcdAddress>,
}

impl ChannelSlot {
    const EMPTY: Self = Self {
        logic: None,
        trigger: ChannelTrigger::Software,
        routing: IrqRouting::Combined,
        notification: None,
        configured: false,
        chain_head: None,
    };
}

/// One eDMA controller instance
#[derive(Debug)]
pub struct DmaController<R> {
    pub(super) regs: EdmaRegs<R>,
    pub(super) instance: DmaInstance,
    pub(super) channels: usize,
    pub(super) protection: Protection,
    pub(super) slots: [ChannelSlot; MAX_CHANNELS_PER_CONTROLLER],
    pub(super) error_notification: Option<ErrorNotification>,
    pub(super) memory_sync: Cell<u64>,
    /// Channels whose scatter-gather chain ran to its final DONE
    chain_complete: Cell<u64>,
}

impl<R: RegisterAccess> DmaController<R> {
    /// Initialize the controller described by `config`.
    ///
    /// Writes the control register, then disables requests and error
    /// interrupts and clears interrupt, error and DONE flags on every channel.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidChannelCount`] or [`ConfigError::InvalidGroupPriority`].
    pub fn init(bus: R, config: &ControllerConfig) -> ConfigResult<Self> {
        if !SUPPORTED_CHANNEL_COUNTS.contains(&config.channels) {
            return Err(ConfigError::InvalidChannelCount);
        }
        if config.group_priorities.iter().any(|&p| p > MAX_GROUP_PRIORITY) {
            return Err(ConfigError::InvalidGroupPriority);
        }

        let controller = Self {
            regs: EdmaRegs::new(bus, config.base, config.endian),
            instance: config.instance,
            channels: config.channels,
            protection: config.protection,
            slots: [ChannelSlot::EMPTY; MAX_CHANNELS_PER_CONTROLLER],
            error_notification: config.error_notification,
            memory_sync: Cell::new(0),
            chain_complete: Cell::new(0),
        };

        let mut cr = 0;
        for (enabled, bit) in [
            (config.debug_halt, CR_EDBG),
            (config.round_robin_channels, CR_ERCA),
            (config.round_robin_groups, CR_ERGA),
            (config.halt_on_error, CR_HOE),
            (config.continuous_link, CR_CLM),
            (config.minor_loop_mapping, CR_EMLM),
        ] {
            if enabled {
                cr |= bit;
            }
        }
        for (field, priority) in CR_GRPPRI.iter().zip(config.group_priorities) {
            cr = field.set(cr, u32::from(priority));
        }
        controller.regs.set_control(cr);

        controller.regs.clear_enable_request(CMD_ALL);
        controller.regs.clear_enable_error_interrupt(CMD_ALL);
        controller.regs.clear_interrupt_request(CMD_ALL);
        controller.regs.clear_error(CMD_ALL);
        controller.regs.clear_done(CMD_ALL);

        info!(
            "edma {} initialized: {} channels, control {}",
            config.instance.0,
            config.channels,
            cr
        );
        Ok(controller)
    }

    /// Instance identifier
    #[must_use]
    pub const fn instance(&self) -> DmaInstance {
        self.instance
    }

    /// Number of hardware channels
    #[must_use]
    pub const fn channel_count(&self) -> usize {
        self.channels
    }

    /// Bus byte order
    #[must_use]
    pub const fn endian(&self) -> Endian {
        self.regs.endian()
    }

    /// Register block
    #[must_use]
    pub const fn regs(&self) -> &EdmaRegs<R> {
        &self.regs
    }

    #[inline]
    pub(super) fn check(&self, channel: usize) -> Result<usize> {
        if channel < self.channels {
            Ok(channel)
        } else {
            Err(ChannelError::InvalidChannel.into())
        }
    }

    /// Command register value addressing `channel`
    #[inline(always)]
    fn cmd(channel: usize) -> u8 {
        channel as u8
    }

    // -------------------------------------------------------------------------
    // Channel manager
    // -------------------------------------------------------------------------

    /// Record the software settings of `channel`
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`].
    pub fn assign_channel(
        &mut self,
        channel: usize,
        logic: Option<LogicChannel>,
        trigger: ChannelTrigger,
        routing: IrqRouting,
        notification: Option<ChannelNotification>,
    ) -> Result<()> {
        let channel = self.check(channel)?;
        self.slots[channel] = ChannelSlot {
            logic,
            trigger,
            routing,
            notification,
            ..ChannelSlot::EMPTY
        };
        Ok(())
    }

    /// Replace the completion notification of `channel`
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`].
    pub fn set_notification(
        &mut self,
        channel: usize,
        notification: Option<ChannelNotification>,
    ) -> Result<()> {
        let channel = self.check(channel)?;
        self.slots[channel].notification = notification;
        Ok(())
    }

    /// Logic channel mapped onto `channel`, if any
    #[must_use]
    pub fn logic_channel(&self, channel: usize) -> Option<LogicChannel> {
        self.slots.get(channel).and_then(|slot| slot.logic)
    }

    /// Put `channel` into a known disabled state.
    ///
    /// Disables the request line, writes priority and preemption (through
    /// the soft lock when the controller is protected), writes master ID
    /// replication and clears DONE.
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`], [`ConfigError::InvalidPriority`] or
    /// [`ConfigError::InvalidMasterId`].
    pub fn init_channel(
        &mut self,
        channel: usize,
        priority: u8,
        preemption: Preemption,
        master_id: MasterId,
    ) -> Result<()> {
        let channel = self.check(channel)?;
        let dchpri = encode_priority(priority, preemption)?;
        let dchmid = master_id.to_bits()?;

        self.regs.clear_enable_request(Self::cmd(channel));
        self.protected_write(self.regs.dchpri_addr(channel), dchpri);
        self.protected_write(self.regs.dchmid_addr(channel), dchmid);
        self.regs.clear_done(Self::cmd(channel));

        self.slots[channel].configured = false;
        self.slots[channel].chain_head = None;
        self.memory_sync.set(self.memory_sync.get() & !(1 << channel));
        debug!("edma {} channel {} priority {}", self.instance.0, channel, priority);
        Ok(())
    }

    fn protected_write(&self, addr: usize, value: u8) {
        protected_write8(self.regs.bus(), self.protection, self.regs.base(), addr, value);
    }

    /// Change the arbitration priority of `channel`, keeping its preemption
    /// flags.
    ///
    /// Duplicate priorities within a group are accepted; the hardware
    /// resolves them in favour of the lower channel index.
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`] or [`ConfigError::InvalidPriority`].
    pub fn set_priority(&self, channel: usize, priority: u8) -> Result<()> {
        let channel = self.check(channel)?;
        let current = self.regs.channel_priority(channel);
        let value = encode_priority(priority, Preemption::from_bits(current))?;
        self.protected_write(self.regs.dchpri_addr(channel), value);
        Ok(())
    }

    /// Arbitration priority of `channel`
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`].
    pub fn priority(&self, channel: usize) -> Result<u8> {
        let channel = self.check(channel)?;
        Ok(DCHPRI_CHPRI.get(u32::from(self.regs.channel_priority(channel))) as u8)
    }

    /// Preemption flags of `channel`
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`].
    pub fn preemption(&self, channel: usize) -> Result<Preemption> {
        let channel = self.check(channel)?;
        Ok(Preemption::from_bits(self.regs.channel_priority(channel)))
    }

    /// Master ID replication of `channel`
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`].
    pub fn master_id(&self, channel: usize) -> Result<MasterId> {
        let channel = self.check(channel)?;
        Ok(MasterId::from_bits(self.regs.channel_master_id(channel)))
    }

    /// Start `channel`.
    ///
    /// Software-triggered channels get their START bit set; hardware
    /// triggered channels get their request line enabled. A completed
    /// channel has DONE cleared first.
    ///
    /// A software start is ignored while one is still pending or while the
    /// current major loop is partly done, so repeated calls never trigger an
    /// extra minor loop. Each START runs one minor loop: descriptors with
    /// more than one iteration keep running only through channel linking.
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`].
    pub fn start(&self, channel: usize) -> Result<()> {
        let channel = self.check(channel)?;
        let flags = self.flags(channel);
        if flags.done {
            self.regs.clear_done(Self::cmd(channel));
            self.chain_complete.set(self.chain_complete.get() | (1 << channel));
        } else if self.slots[channel].trigger == ChannelTrigger::Software
            && (flags.start || self.major_loop_started(channel))
        {
            trace!("edma {} channel {} already running", self.instance.0, channel);
            return Ok(());
        }
        match self.slots[channel].trigger {
            ChannelTrigger::Software => self.regs.set_start(Self::cmd(channel)),
            ChannelTrigger::Hardware => self.regs.set_enable_request(Self::cmd(channel)),
        }
        Ok(())
    }

    /// Disable the request line of `channel`; a minor loop in flight completes
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`].
    pub fn stop(&self, channel: usize) -> Result<()> {
        let channel = self.check(channel)?;
        self.regs.clear_enable_request(Self::cmd(channel));
        Ok(())
    }

    /// Enable the request line of `channel`
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`].
    pub fn set_hardware_request(&self, channel: usize) -> Result<()> {
        let channel = self.check(channel)?;
        self.regs.set_enable_request(Self::cmd(channel));
        Ok(())
    }

    /// Disable the request line of `channel`
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`].
    pub fn clear_hardware_request(&self, channel: usize) -> Result<()> {
        self.stop(channel)
    }

    /// Enable the error interrupt of `channel`
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`].
    pub fn enable_error_interrupt(&self, channel: usize) -> Result<()> {
        let channel = self.check(channel)?;
        self.regs.set_enable_error_interrupt(Self::cmd(channel));
        Ok(())
    }

    /// Disable the error interrupt of `channel`
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`].
    pub fn disable_error_interrupt(&self, channel: usize) -> Result<()> {
        let channel = self.check(channel)?;
        self.regs.clear_enable_error_interrupt(Self::cmd(channel));
        Ok(())
    }

    /// Clear DONE of `channel`
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`].
    pub fn clear_done(&self, channel: usize) -> Result<()> {
        let channel = self.check(channel)?;
        self.regs.clear_done(Self::cmd(channel));
        Ok(())
    }

    /// Clear the latched error and the memory sync flag of `channel`
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`].
    pub fn clear_error(&self, channel: usize) -> Result<()> {
        let channel = self.check(channel)?;
        self.regs.clear_error(Self::cmd(channel));
        self.memory_sync.set(self.memory_sync.get() & !(1 << channel));
        Ok(())
    }

    /// Record a cache coherency failure detected by software for `channel`.
    ///
    /// Reported as [`ErrorKind::MemorySyncError`] until the channel is
    /// re-initialized or its error is cleared.
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`].
    pub fn flag_memory_sync_error(&self, channel: usize) -> Result<()> {
        let channel = self.check(channel)?;
        self.memory_sync.set(self.memory_sync.get() | (1 << channel));
        warn!("edma {} channel {} memory sync error", self.instance.0, channel);
        Ok(())
    }

    pub(super) fn memory_sync_flagged(&self, channel: usize) -> bool {
        self.memory_sync.get() & (1 << channel) != 0
    }

    // -------------------------------------------------------------------------
    // Controller-wide control
    // -------------------------------------------------------------------------

    /// Stall all channels after their current read/write completes
    pub fn halt(&self) {
        self.regs.set_control_bits(CR_HALT);
    }

    /// Resume after [`halt`](Self::halt)
    pub fn resume(&self) {
        self.regs.clear_control_bits(CR_HALT);
    }

    /// Whether the controller is halted
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.regs.control() & CR_HALT != 0
    }

    /// Cancel the executing transfer without reporting an error
    pub fn cancel_transfer(&self) {
        self.regs.set_control_bits(CR_CX);
    }

    /// Cancel the executing transfer and report it as an error
    pub fn cancel_transfer_with_error(&self) {
        self.regs.set_control_bits(CR_ECX);
    }

    // -------------------------------------------------------------------------
    // Status
    // -------------------------------------------------------------------------

    pub(super) fn flags(&self, channel: usize) -> TcdFlags {
        let raw = self.regs.bus().read32(self.regs.tcd_addr(channel) + 4 * word::BITER_CSR);
        TcdFlags::from_raw(self.endian().low_half().get(raw) as u16)
    }

    fn major_loop_started(&self, channel: usize) -> bool {
        let tcd = TcdWords::read(self.regs.bus(), self.regs.tcd_addr(channel), self.endian());
        tcd.current_iterations() != tcd.beginning_iterations()
    }

    /// Whether a transfer on `channel` has started and not reached DONE:
    /// either CITER has moved away from BITER, or scatter-gather has loaded a
    /// descriptor past the configured one.
    fn transfer_in_progress(&self, channel: usize) -> bool {
        let slot = &self.slots[channel];
        if !slot.configured {
            return false;
        }
        let tcd = TcdWords::read(self.regs.bus(), self.regs.tcd_addr(channel), self.endian());
        if tcd.current_iterations() != tcd.beginning_iterations() {
            return true;
        }
        match slot.chain_head {
            Some(head) if self.chain_complete.get() & (1 << channel) == 0 => {
                tcd.next_descriptor() != Some(head)
            }
            _ => false,
        }
    }

    /// Whether the major loop of `channel` has completed (DONE)
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`].
    pub fn is_completed(&self, channel: usize) -> Result<bool> {
        let channel = self.check(channel)?;
        Ok(self.flags(channel).done)
    }

    /// Busy-wait until `channel` reports DONE
    ///
    /// Polls every [`COMPLETION_POLL_US`] microseconds. Does not clear DONE.
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`], [`ChannelError::Faulted`] if the
    /// channel latches an error, [`ChannelError::Timeout`] once `timeout_us`
    /// has elapsed.
    pub fn wait_for_completion<D: DelayNs>(
        &self,
        channel: usize,
        delay: &mut D,
        timeout_us: u32,
    ) -> Result<()> {
        let channel = self.check(channel)?;
        let mut elapsed = 0u32;
        while !self.flags(channel).done {
            if self.regs.is_error_pending(channel) {
                return Err(ChannelError::Faulted.into());
            }
            if elapsed >= timeout_us {
                warn!("edma {} channel {} timed out", self.instance.0, channel);
                return Err(ChannelError::Timeout.into());
            }
            delay.delay_us(COMPLETION_POLL_US);
            elapsed = elapsed.saturating_add(COMPLETION_POLL_US);
        }
        Ok(())
    }

    /// Whether `channel` is executing (ACTIVE)
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`].
    pub fn is_active(&self, channel: usize) -> Result<bool> {
        let channel = self.check(channel)?;
        Ok(self.flags(channel).active)
    }

    /// Classify the error state of `channel`
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`].
    pub fn get_channel_error_status(&self, channel: usize) -> Result<ErrorKind> {
        let channel = self.check(channel)?;
        let status = ErrorStatus::from_raw(self.regs.error_status());
        Ok(classify_channel(
            &status,
            channel,
            self.regs.is_error_pending(channel),
            self.memory_sync_flagged(channel),
        ))
    }

    /// Lifecycle state of `channel`
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`].
    pub fn channel_state(&self, channel: usize) -> Result<ChannelState> {
        let channel = self.check(channel)?;
        let flags = self.flags(channel);
        let state = if self.regs.is_error_pending(channel) || self.memory_sync_flagged(channel) {
            ChannelState::Error
        } else if flags.active {
            ChannelState::Active
        } else if flags.done {
            ChannelState::Done
        } else if self.transfer_in_progress(channel) {
            ChannelState::Active
        } else if flags.start || self.regs.is_request_enabled(channel) {
            ChannelState::Armed
        } else if self.slots[channel].configured {
            ChannelState::Configured
        } else {
            ChannelState::Disabled
        };
        Ok(state)
    }

    /// Snapshot of `channel`
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`].
    pub fn channel_status(&self, channel: usize) -> Result<ChannelStatus> {
        Ok(ChannelStatus {
            state: self.channel_state(channel)?,
            remaining_iterations: self.remaining_iterations(channel)?,
            request_enabled: self.regs.is_request_enabled(channel),
            hardware_request: self.regs.is_hardware_request_pending(channel),
            interrupt_pending: self.regs.is_interrupt_pending(channel),
            error: self.get_channel_error_status(channel)?,
        })
    }

    // -------------------------------------------------------------------------
    // Descriptor configuration
    // -------------------------------------------------------------------------

    fn link_target(&self, channel: usize, next_channel: usize) -> TcdResult<u8> {
        if next_channel == channel {
            warn!("edma {} channel {} linked to itself", self.instance.0, channel);
            return Err(TcdError::SelfLink);
        }
        if next_channel >= self.channels {
            warn!(
                "edma {} channel {} linked to {} beyond {} channels",
                self.instance.0,
                channel,
                next_channel,
                self.channels
            );
            return Err(TcdError::LinkOutOfRange);
        }
        Ok(next_channel as u8)
    }

    fn write_channel_tcd(
        &mut self,
        channel: usize,
        attrs: &TransferAttributes,
        link: Option<usize>,
        next: Option<TcdAddress>,
    ) -> Result<()> {
        let channel = self.check(channel)?;
        let link = match link {
            Some(target) => Some(self.link_target(channel, target)?),
            None => None,
        };
        let addr = self.regs.tcd_addr(channel);
        if let Some(next) = next {
            validate_next(self.regs.bus(), self.endian(), addr, next)?;
        }
        let tcd = TcdWords::encode(attrs, self.endian(), link, next)?;
        tcd.write(self.regs.bus(), addr);
        self.slots[channel].configured = true;
        self.slots[channel].chain_head = next;
        self.chain_complete.set(self.chain_complete.get() & !(1 << channel));
        trace!("edma {} channel {} descriptor written", self.instance.0, channel);
        Ok(())
    }

    /// Write the descriptor of `channel`
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`] or [`TcdError::InvalidModulo`].
    pub fn configure_tcd(&mut self, channel: usize, attrs: &TransferAttributes) -> Result<()> {
        self.write_channel_tcd(channel, attrs, None, None)
    }

    /// Write the descriptor of `channel`, linking `next_channel` after every
    /// minor loop and after the major loop.
    ///
    /// The iteration count is limited to 9 bits.
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`], [`TcdError::SelfLink`],
    /// [`TcdError::LinkOutOfRange`] or [`TcdError::InvalidModulo`].
    pub fn configure_linked_tcd(
        &mut self,
        channel: usize,
        attrs: &TransferAttributes,
        next_channel: usize,
    ) -> Result<()> {
        self.write_channel_tcd(channel, attrs, Some(next_channel), None)
    }

    /// Write the descriptor of `channel`, loading `next` when the major loop
    /// completes.
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`], [`TcdError::NullDescriptor`],
    /// [`TcdError::MisalignedDescriptor`], [`TcdError::ScatterGatherCycle`]
    /// or [`TcdError::InvalidModulo`].
    pub fn configure_scatter_gather_tcd(
        &mut self,
        channel: usize,
        attrs: &TransferAttributes,
        next: TcdAddress,
    ) -> Result<()> {
        self.write_channel_tcd(channel, attrs, None, Some(next))
    }

    /// Combination of [`configure_linked_tcd`](Self::configure_linked_tcd)
    /// and [`configure_scatter_gather_tcd`](Self::configure_scatter_gather_tcd)
    ///
    /// # Errors
    ///
    /// Any error of either.
    pub fn configure_scatter_gather_linked_tcd(
        &mut self,
        channel: usize,
        attrs: &TransferAttributes,
        next: TcdAddress,
        next_channel: usize,
    ) -> Result<()> {
        self.write_channel_tcd(channel, attrs, Some(next_channel), Some(next))
    }

    /// Write a descriptor at `address` in memory, e.g. an entry of a
    /// scatter-gather table, optionally chaining to `next`.
    ///
    /// # Errors
    ///
    /// [`TcdError::NullDescriptor`] or [`TcdError::MisalignedDescriptor`] for
    /// `address` or `next`, [`TcdError::ScatterGatherCycle`] or
    /// [`TcdError::InvalidModulo`].
    pub fn configure_descriptor(
        &self,
        address: TcdAddress,
        attrs: &TransferAttributes,
        next: Option<TcdAddress>,
    ) -> Result<()> {
        if address.is_null() {
            return Err(TcdError::NullDescriptor.into());
        }
        if !address.is_aligned() {
            return Err(TcdError::MisalignedDescriptor.into());
        }
        if let Some(next) = next {
            validate_next(self.regs.bus(), self.endian(), address.as_usize(), next)?;
        }
        let tcd = TcdWords::encode(attrs, self.endian(), None, next)?;
        tcd.write(self.regs.bus(), address.as_usize());
        Ok(())
    }

    /// Read back the descriptor of `channel`
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`].
    pub fn read_tcd(&self, channel: usize) -> Result<TcdWords> {
        let channel = self.check(channel)?;
        Ok(TcdWords::read(
            self.regs.bus(),
            self.regs.tcd_addr(channel),
            self.endian(),
        ))
    }

    fn tcd_word(&self, channel: usize, index: usize) -> Result<u32> {
        let channel = self.check(channel)?;
        Ok(self.regs.bus().read32(self.regs.tcd_addr(channel) + 4 * index))
    }

    /// Major loop iterations left on `channel` (CITER)
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`].
    pub fn remaining_iterations(&self, channel: usize) -> Result<u16> {
        let raw = self.tcd_word(channel, word::CITER_DOFF)?;
        Ok(iteration_count(self.endian().high_half().get(raw) as u16))
    }

    /// Current source address of `channel`
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`].
    pub fn source_address(&self, channel: usize) -> Result<u32> {
        self.tcd_word(channel, word::SADDR)
    }

    /// Current destination address of `channel`
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`].
    pub fn destination_address(&self, channel: usize) -> Result<u32> {
        self.tcd_word(channel, word::DADDR)
    }

    /// Change the completion interrupt enables of `channel` in place
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`].
    pub fn set_interrupt_flags(&self, channel: usize, major: bool, half: bool) -> Result<()> {
        let channel = self.check(channel)?;
        let half_word = self.endian().low_half();
        let mut value = 0;
        if major {
            value |= csr::INTMAJOR;
        }
        if half {
            value |= csr::INTHALF;
        }
        self.regs.bus().read_modify_write(
            self.regs.tcd_addr(channel) + 4 * word::BITER_CSR,
            csr::INT_ENABLES << half_word.shift,
            value << half_word.shift,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::vec;

    use super::*;
    use crate::driver::classify::BusSide;
    use crate::error::Error;
    use crate::register::edma::{
        CR_OFFSET, ERQL_OFFSET, ES_ERRCHN, ES_SBE, ES_VLD,
    };
    use crate::register::protect::SLBR_OFFSET;
    use crate::testing::{BusWrite, MockBus, MockDelay};

    const BASE: usize = 0x4000_8000;

    fn controller(bus: &MockBus, channels: usize) -> DmaController<&MockBus> {
        bus.add_edma(BASE, channels, Endian::Little);
        DmaController::init(bus, &ControllerConfig::new(DmaInstance(0), BASE, channels)).unwrap()
    }

    fn attrs() -> TransferAttributes {
        TransferAttributes::new(0x2000_0000, 0x2000_0100)
            .with_minor_loop_bytes(4)
            .with_iterations(4)
            .with_interrupts(true, false)
    }

    #[test]
    fn init_rejects_unsupported_width() {
        let bus = MockBus::new();
        for channels in [0, 8, 48, 128] {
            let config = ControllerConfig::new(DmaInstance(0), BASE, channels);
            assert_eq!(
                DmaController::init(&bus, &config).err(),
                Some(ConfigError::InvalidChannelCount)
            );
        }
    }

    #[test]
    fn init_rejects_group_priority() {
        let bus = MockBus::new();
        let config =
            ControllerConfig::new(DmaInstance(0), BASE, 32).with_group_priorities([0, 4, 0, 0]);
        assert_eq!(
            DmaController::init(&bus, &config).err(),
            Some(ConfigError::InvalidGroupPriority)
        );
    }

    #[test]
    fn init_writes_control_register() {
        let bus = MockBus::new();
        bus.add_edma(BASE, 64, Endian::Little);
        let config = ControllerConfig::new(DmaInstance(0), BASE, 64)
            .with_round_robin(true, true)
            .with_halt_on_error(true)
            .with_minor_loop_mapping(true)
            .with_group_priorities([3, 2, 1, 0]);
        let controller = DmaController::init(&bus, &config).unwrap();

        let cr = bus.read32(BASE + CR_OFFSET);
        let enabled = CR_ERCA | CR_ERGA | CR_HOE | CR_EMLM;
        assert_eq!(cr & enabled, enabled);
        assert_eq!(cr & CR_CLM, 0);
        assert_eq!(cr & 0xFF00, 0x1B00);
        assert!(!controller.is_halted());
    }

    #[test]
    fn init_channel_sequence() {
        let bus = MockBus::new();
        let mut controller = controller(&bus, 16);
        bus.clear_writes();

        controller
            .init_channel(4, 7, Preemption::new(true, false), MasterId::replicate(1))
            .unwrap();

        assert_eq!(
            bus.writes(),
            vec![
                BusWrite::Byte(BASE + 0x19, 4),
                BusWrite::Byte(BASE + 0x107, 0xC7),
                BusWrite::Byte(BASE + 0x147, 0x81),
                BusWrite::Byte(BASE + 0x1F, 4),
            ]
        );
        assert_eq!(controller.priority(4), Ok(7));
        assert_eq!(controller.preemption(4), Ok(Preemption::new(true, false)));
        assert_eq!(controller.master_id(4), Ok(MasterId::replicate(1)));
        assert_eq!(controller.channel_state(4), Ok(ChannelState::Disabled));
    }

    #[test]
    fn protected_priority_write_uses_soft_lock() {
        let bus = MockBus::new();
        bus.add_edma(BASE, 16, Endian::Little);
        let config = ControllerConfig::new(DmaInstance(0), BASE, 16)
            .with_protection(Protection::SoftLock);
        let controller = DmaController::init(&bus, &config).unwrap();
        bus.clear_writes();

        controller.set_priority(2, 9).unwrap();

        // channel 2 sits at byte 0x101 on a little-endian bus
        let slbr = BASE + SLBR_OFFSET + 0x101 / 4;
        assert_eq!(
            bus.writes(),
            vec![
                BusWrite::Byte(slbr, 0x20),
                BusWrite::Byte(BASE + 0x101, 0x09),
                BusWrite::Byte(slbr, 0x22),
            ]
        );
    }

    #[test]
    fn set_priority_keeps_preemption_and_accepts_duplicates() {
        let bus = MockBus::new();
        let mut controller = controller(&bus, 16);
        controller
            .init_channel(0, 1, Preemption::new(true, true), MasterId::DISABLED)
            .unwrap();
        controller
            .init_channel(1, 2, Preemption::NONE, MasterId::DISABLED)
            .unwrap();

        controller.set_priority(0, 2).unwrap();

        assert_eq!(controller.priority(0), Ok(2));
        assert_eq!(controller.priority(1), Ok(2));
        assert_eq!(controller.preemption(0), Ok(Preemption::new(true, true)));
        assert_eq!(
            controller.set_priority(0, 16),
            Err(Error::Config(ConfigError::InvalidPriority))
        );
    }

    #[test]
    fn linked_channel_bounds() {
        let bus = MockBus::new();
        let mut controller = controller(&bus, 16);
        assert_eq!(
            controller.configure_linked_tcd(3, &attrs(), 3),
            Err(Error::Tcd(TcdError::SelfLink))
        );
        assert_eq!(
            controller.configure_linked_tcd(3, &attrs(), 16),
            Err(Error::Tcd(TcdError::LinkOutOfRange))
        );
        for next in [0, 2, 4, 15] {
            assert_eq!(controller.configure_linked_tcd(3, &attrs(), next), Ok(()));
            assert_eq!(controller.read_tcd(3).unwrap().major_link(), Some(next as u8));
        }
    }

    #[test]
    fn invalid_channel_rejected() {
        let bus = MockBus::new();
        let mut controller = controller(&bus, 16);
        let invalid = Err(Error::Channel(ChannelError::InvalidChannel));
        assert_eq!(controller.configure_tcd(16, &attrs()), invalid);
        assert_eq!(controller.start(16), invalid);
        assert_eq!(controller.is_completed(16), Err(Error::Channel(ChannelError::InvalidChannel)));
    }

    #[test]
    fn configure_marks_channel_configured() {
        let bus = MockBus::new();
        let mut controller = controller(&bus, 16);
        controller.configure_tcd(1, &attrs()).unwrap();
        assert_eq!(controller.channel_state(1), Ok(ChannelState::Configured));
        assert_eq!(controller.remaining_iterations(1), Ok(4));
        assert_eq!(controller.source_address(1), Ok(0x2000_0000));
        assert_eq!(controller.destination_address(1), Ok(0x2000_0100));
    }

    #[test]
    fn start_is_idempotent() {
        let bus = MockBus::new();
        let mut controller = controller(&bus, 16);
        controller.configure_tcd(1, &attrs()).unwrap();

        controller.start(1).unwrap();
        controller.start(1).unwrap();
        assert_eq!(controller.channel_state(1), Ok(ChannelState::Armed));

        assert!(bus.service(BASE, 1));
        assert!(!bus.service(BASE, 1));
        assert_eq!(controller.remaining_iterations(1), Ok(3));
        assert_eq!(controller.channel_state(1), Ok(ChannelState::Active));
        assert_eq!(controller.is_completed(1), Ok(false));
    }

    #[test]
    fn start_during_partial_major_loop_is_ignored() {
        let bus = MockBus::new();
        let mut controller = controller(&bus, 16);
        controller.configure_tcd(1, &attrs()).unwrap();
        controller.start(1).unwrap();
        assert!(bus.service(BASE, 1));
        bus.clear_writes();

        controller.start(1).unwrap();
        assert!(bus.writes().is_empty());
        assert!(!bus.service(BASE, 1));
        assert_eq!(controller.remaining_iterations(1), Ok(3));
        assert_eq!(controller.channel_state(1), Ok(ChannelState::Active));
    }

    #[test]
    fn hardware_transfer_between_requests_stays_active() {
        let bus = MockBus::new();
        let mut controller = controller(&bus, 16);
        controller
            .assign_channel(2, None, ChannelTrigger::Hardware, IrqRouting::Combined, None)
            .unwrap();
        controller.configure_tcd(2, &attrs()).unwrap();
        controller.start(2).unwrap();
        assert_eq!(controller.channel_state(2), Ok(ChannelState::Armed));

        for remaining in [3, 2, 1] {
            assert!(bus.service(BASE, 2));
            assert_eq!(controller.remaining_iterations(2), Ok(remaining));
            assert_eq!(controller.channel_state(2), Ok(ChannelState::Active));
        }
        assert!(bus.service(BASE, 2));
        assert_eq!(controller.channel_state(2), Ok(ChannelState::Done));
    }

    #[test]
    fn hardware_trigger_enables_request() {
        let bus = MockBus::new();
        let mut controller = controller(&bus, 32);
        controller
            .assign_channel(20, None, ChannelTrigger::Hardware, IrqRouting::Combined, None)
            .unwrap();
        controller.configure_tcd(20, &attrs()).unwrap();

        controller.start(20).unwrap();
        assert_eq!(bus.read32(BASE + ERQL_OFFSET), 1 << 20);
        assert!(!controller.flags(20).start);

        controller.stop(20).unwrap();
        assert_eq!(bus.read32(BASE + ERQL_OFFSET), 0);
    }

    #[test]
    fn completion_and_restart() {
        let bus = MockBus::new();
        let mut controller = controller(&bus, 16);
        controller
            .configure_tcd(0, &attrs().with_iterations(1))
            .unwrap();
        controller.start(0).unwrap();
        bus.service(BASE, 0);

        assert_eq!(controller.is_completed(0), Ok(true));
        assert_eq!(controller.channel_state(0), Ok(ChannelState::Done));

        controller.start(0).unwrap();
        assert_eq!(controller.is_completed(0), Ok(false));
        assert_eq!(controller.channel_state(0), Ok(ChannelState::Armed));
    }

    #[test]
    fn active_flag_is_reported() {
        let bus = MockBus::new();
        let mut controller = controller(&bus, 16);
        controller.configure_tcd(5, &attrs()).unwrap();
        bus.set_channel_flags(BASE, 5, csr::ACTIVE);
        assert_eq!(controller.is_active(5), Ok(true));
        assert_eq!(controller.channel_state(5), Ok(ChannelState::Active));
    }

    #[test]
    fn channel_error_status() {
        let bus = MockBus::new();
        let mut controller = controller(&bus, 16);
        controller.configure_tcd(6, &attrs()).unwrap();
        assert_eq!(controller.get_channel_error_status(6), Ok(ErrorKind::NoError));

        bus.raise_error(BASE, 6, ES_SBE);
        assert_eq!(
            controller.get_channel_error_status(6),
            Ok(ErrorKind::BusError(BusSide::Source))
        );
        assert_eq!(controller.channel_state(6), Ok(ChannelState::Error));

        controller.clear_error(6).unwrap();
        assert_eq!(controller.get_channel_error_status(6), Ok(ErrorKind::NoError));
        assert_eq!(controller.channel_state(6), Ok(ChannelState::Configured));
    }

    #[test]
    fn inconsistent_error_status() {
        let bus = MockBus::new();
        let controller = controller(&bus, 16);
        bus.raise_error(BASE, 6, ES_SBE);
        // ES names channel 6 but channel 7 claims an error as well
        bus.poke32(BASE + crate::register::edma::ERRL_OFFSET, (1 << 6) | (1 << 7));
        assert_eq!(
            controller.get_channel_error_status(7),
            Ok(ErrorKind::HardwareInconsistency)
        );
        assert_eq!(
            bus.read32(BASE + crate::register::edma::ES_OFFSET),
            ES_VLD | ES_SBE | ES_ERRCHN.set(0, 6)
        );
    }

    #[test]
    fn memory_sync_flag() {
        let bus = MockBus::new();
        let controller = controller(&bus, 16);
        controller.flag_memory_sync_error(2).unwrap();
        assert_eq!(controller.get_channel_error_status(2), Ok(ErrorKind::MemorySyncError));
        assert_eq!(controller.channel_state(2), Ok(ChannelState::Error));
        controller.clear_error(2).unwrap();
        assert_eq!(controller.get_channel_error_status(2), Ok(ErrorKind::NoError));
    }

    #[test]
    fn scatter_gather_validation() {
        let bus = MockBus::new();
        let mut controller = controller(&bus, 16);
        let table = TcdAddress(0x2000_4000);
        controller.configure_descriptor(table, &attrs(), None).unwrap();

        assert_eq!(
            controller.configure_scatter_gather_tcd(0, &attrs(), TcdAddress(0)),
            Err(Error::Tcd(TcdError::NullDescriptor))
        );
        assert_eq!(
            controller.configure_scatter_gather_tcd(0, &attrs(), TcdAddress(0x2000_4010)),
            Err(Error::Tcd(TcdError::MisalignedDescriptor))
        );
        let own_slot = TcdAddress(controller.regs().tcd_addr(0) as u32);
        assert_eq!(
            controller.configure_scatter_gather_tcd(0, &attrs(), own_slot),
            Err(Error::Tcd(TcdError::ScatterGatherCycle))
        );

        controller
            .configure_scatter_gather_linked_tcd(0, &attrs(), table, 1)
            .unwrap();
        let tcd = controller.read_tcd(0).unwrap();
        assert_eq!(tcd.next_descriptor(), Some(table));
        assert_eq!(tcd.major_link(), Some(1));
    }

    #[test]
    fn descriptor_table_rejects_cycle() {
        let bus = MockBus::new();
        let controller = controller(&bus, 16);
        let first = TcdAddress(0x2000_4000);
        let second = TcdAddress(0x2000_4020);

        controller.configure_descriptor(second, &attrs(), None).unwrap();
        controller.configure_descriptor(first, &attrs(), Some(second)).unwrap();
        assert_eq!(
            controller.configure_descriptor(second, &attrs(), Some(first)),
            Err(Error::Tcd(TcdError::ScatterGatherCycle))
        );
        assert_eq!(
            controller.configure_descriptor(TcdAddress(0x2000_4004), &attrs(), None),
            Err(Error::Tcd(TcdError::MisalignedDescriptor))
        );
    }

    #[test]
    fn scatter_gather_reload_on_completion() {
        let bus = MockBus::new();
        let mut controller = controller(&bus, 16);
        let table = TcdAddress(0x2000_4000);
        let second = TransferAttributes::new(0x3000_0000, 0x3000_1000).with_iterations(2);
        controller.configure_descriptor(table, &second, None).unwrap();
        controller
            .configure_scatter_gather_tcd(0, &attrs().with_iterations(1), table)
            .unwrap();

        assert_eq!(controller.channel_state(0), Ok(ChannelState::Configured));

        controller.start(0).unwrap();
        bus.service(BASE, 0);

        assert_eq!(controller.source_address(0), Ok(0x3000_0000));
        assert_eq!(controller.remaining_iterations(0), Ok(2));
        assert_eq!(controller.is_completed(0), Ok(false));
        assert_eq!(controller.channel_state(0), Ok(ChannelState::Active));

        controller.start(0).unwrap();
        bus.service(BASE, 0);
        assert_eq!(controller.remaining_iterations(0), Ok(1));
        assert_eq!(controller.channel_state(0), Ok(ChannelState::Active));

        controller.start(0).unwrap();
        assert!(!bus.service(BASE, 0));

        controller.set_hardware_request(0).unwrap();
        bus.service(BASE, 0);
        assert_eq!(controller.channel_state(0), Ok(ChannelState::Done));

        controller.clear_hardware_request(0).unwrap();
        controller.start(0).unwrap();
        assert_eq!(controller.channel_state(0), Ok(ChannelState::Armed));
    }

    #[test]
    fn interrupt_flags_modified_in_place() {
        let bus = MockBus::new();
        let mut controller = controller(&bus, 16);
        controller.configure_linked_tcd(3, &attrs(), 4).unwrap();

        controller.set_interrupt_flags(3, false, true).unwrap();

        let flags = controller.read_tcd(3).unwrap().flags();
        assert!(!flags.interrupt_major);
        assert!(flags.interrupt_half);
        assert!(flags.major_link);
        assert_eq!(flags.major_link_channel, 4);
    }

    #[test]
    fn halt_resume_and_cancel() {
        let bus = MockBus::new();
        let controller = controller(&bus, 16);
        controller.halt();
        assert!(controller.is_halted());
        controller.resume();
        assert!(!controller.is_halted());

        controller.cancel_transfer();
        assert_ne!(bus.read32(BASE + CR_OFFSET) & CR_CX, 0);
        controller.cancel_transfer_with_error();
        assert_ne!(bus.read32(BASE + CR_OFFSET) & CR_ECX, 0);
    }

    #[test]
    fn error_interrupt_enable() {
        let bus = MockBus::new();
        let controller = controller(&bus, 64);
        controller.enable_error_interrupt(40).unwrap();
        assert!(controller.regs().is_error_interrupt_enabled(40));
        controller.disable_error_interrupt(40).unwrap();
        assert!(!controller.regs().is_error_interrupt_enabled(40));
    }

    #[test]
    fn channel_status_snapshot() {
        let bus = MockBus::new();
        let mut controller = controller(&bus, 16);
        controller
            .assign_channel(
                9,
                Some(LogicChannel(30)),
                ChannelTrigger::Hardware,
                IrqRouting::Combined,
                None,
            )
            .unwrap();
        controller.configure_tcd(9, &attrs()).unwrap();
        controller.set_hardware_request(9).unwrap();

        let status = controller.channel_status(9).unwrap();
        assert_eq!(status.state, ChannelState::Armed);
        assert_eq!(status.remaining_iterations, 4);
        assert!(status.request_enabled);
        assert!(!status.interrupt_pending);
        assert_eq!(status.error, ErrorKind::NoError);
        assert_eq!(controller.logic_channel(9), Some(LogicChannel(30)));

        controller.clear_hardware_request(9).unwrap();
        assert_eq!(controller.channel_state(9), Ok(ChannelState::Configured));
    }

    #[test]
    fn wait_for_completion_returns_once_done() {
        let bus = MockBus::new();
        let mut controller = controller(&bus, 16);
        controller.configure_tcd(6, &attrs()).unwrap();
        controller.set_hardware_request(6).unwrap();
        for _ in 0..4 {
            assert!(bus.service(BASE, 6));
        }

        let mut delay = MockDelay::new();
        assert_eq!(controller.wait_for_completion(6, &mut delay, 100), Ok(()));
        assert_eq!(delay.total_us(), 0);
    }

    #[test]
    fn wait_for_completion_times_out() {
        let bus = MockBus::new();
        let mut controller = controller(&bus, 16);
        controller.configure_tcd(6, &attrs()).unwrap();

        let mut delay = MockDelay::new();
        assert_eq!(
            controller.wait_for_completion(6, &mut delay, 50),
            Err(Error::Channel(ChannelError::Timeout))
        );
        assert_eq!(delay.total_us(), 50);
    }

    #[test]
    fn wait_for_completion_stops_on_error() {
        let bus = MockBus::new();
        let mut controller = controller(&bus, 16);
        controller.configure_tcd(6, &attrs()).unwrap();
        bus.raise_error(BASE, 6, ES_SBE);

        let mut delay = MockDelay::new();
        assert_eq!(
            controller.wait_for_completion(6, &mut delay, 50),
            Err(Error::Channel(ChannelError::Faulted))
        );
        assert_eq!(
            controller.wait_for_completion(16, &mut delay, 50),
            Err(Error::Channel(ChannelError::InvalidChannel))
        );
    }
}
