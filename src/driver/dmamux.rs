//! DMA request multiplexer.
//!
//! Each multiplexer channel selects which peripheral request source drives
//! the eDMA channel wired to it. A binding is always written as one complete
//! byte after the channel has been disabled, so the source never changes
//! while the channel is enabled.

use super::engine::MuxInstance;
use crate::constants::{MAX_MUX_CHANNELS, MAX_MUX_SOURCE};
use crate::error::{ChannelError, ConfigError, ConfigResult, Result};
use crate::register::RegisterAccess;
use crate::register::dmamux::{
    CHCFG_ENBL, CHCFG_RESET, CHCFG_SOURCE, CHCFG_TRIG, DmaMuxRegs, encode_chcfg,
};

/// Decoded multiplexer channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MuxBinding {
    /// Channel enabled
    pub enabled: bool,
    /// Periodic trigger mode
    pub trigger: bool,
    /// Request source
    pub source: u8,
}

impl MuxBinding {
    /// Power-on binding: disabled, untriggered, source 0
    pub const DISABLED: Self = Self {
        enabled: false,
        trigger: false,
        source: 0,
    };

    /// Create from a raw CHCFG byte
    #[must_use]
    pub const fn from_raw(raw: u8) -> Self {
        Self {
            enabled: raw & CHCFG_ENBL != 0,
            trigger: raw & CHCFG_TRIG != 0,
            source: CHCFG_SOURCE.get(raw as u32) as u8,
        }
    }

    /// Convert to a raw CHCFG byte
    #[must_use]
    pub const fn to_raw(&self) -> u8 {
        encode_chcfg(self.enabled, self.trigger, self.source)
    }
}

/// One multiplexer instance
#[derive(Debug)]
pub struct DmaMux<R> {
    regs: DmaMuxRegs<R>,
    instance: MuxInstance,
    channels: usize,
}

impl<R: RegisterAccess> DmaMux<R> {
    /// Take over the multiplexer at `base` and reset every channel
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidChannelCount`] if `channels` is zero or above 64.
    pub fn init(bus: R, instance: MuxInstance, base: usize, channels: usize) -> ConfigResult<Self> {
        if channels == 0 || channels > MAX_MUX_CHANNELS {
            return Err(ConfigError::InvalidChannelCount);
        }
        let mux = Self {
            regs: DmaMuxRegs::new(bus, base),
            instance,
            channels,
        };
        mux.reset_all();
        debug!("dmamux {} initialized with {} channels", instance.0, channels);
        Ok(mux)
    }

    /// Return every channel to its power-on binding
    pub fn deinit(&self) {
        self.reset_all();
        debug!("dmamux {} deinitialized", self.instance.0);
    }

    fn reset_all(&self) {
        for channel in 0..self.channels {
            self.regs.set_channel_config(channel, CHCFG_RESET);
        }
    }

    /// Instance identifier
    #[must_use]
    pub const fn instance(&self) -> MuxInstance {
        self.instance
    }

    /// Number of channels
    #[must_use]
    pub const fn channel_count(&self) -> usize {
        self.channels
    }

    fn check(&self, channel: usize) -> Result<usize> {
        if channel < self.channels {
            Ok(channel)
        } else {
            Err(ChannelError::InvalidChannel.into())
        }
    }

    /// Route request `source` to `channel` and enable it.
    ///
    /// The channel is disabled first; the new configuration is then written
    /// in a single store.
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`] or [`ConfigError::InvalidSource`].
    pub fn bind(&self, channel: usize, source: u8, trigger: bool) -> Result<()> {
        let channel = self.check(channel)?;
        if source > MAX_MUX_SOURCE {
            return Err(ConfigError::InvalidSource.into());
        }
        self.regs.set_channel_config(channel, CHCFG_RESET);
        self.regs
            .set_channel_config(channel, encode_chcfg(true, trigger, source));
        trace!("dmamux {} channel {} bound to source {}", self.instance.0, channel, source);
        Ok(())
    }

    /// Reset `channel` to its power-on binding
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`].
    pub fn unbind(&self, channel: usize) -> Result<()> {
        let channel = self.check(channel)?;
        self.regs.set_channel_config(channel, CHCFG_RESET);
        Ok(())
    }

    /// Current binding of `channel`
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`].
    pub fn get_binding(&self, channel: usize) -> Result<MuxBinding> {
        let channel = self.check(channel)?;
        Ok(MuxBinding::from_raw(self.regs.channel_config(channel)))
    }

    /// Enable `channel`, keeping its source and trigger mode
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`].
    pub fn enable_channel(&self, channel: usize) -> Result<()> {
        let channel = self.check(channel)?;
        let raw = self.regs.channel_config(channel);
        if raw & CHCFG_ENBL == 0 {
            self.regs.set_channel_config(channel, raw | CHCFG_ENBL);
        }
        Ok(())
    }

    /// Disable `channel`, keeping its source and trigger mode
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidChannel`].
    pub fn disable_channel(&self, channel: usize) -> Result<()> {
        let channel = self.check(channel)?;
        let raw = self.regs.channel_config(channel);
        self.regs.set_channel_config(channel, raw & !CHCFG_ENBL);
        Ok(())
    }
}
