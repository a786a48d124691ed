//! DMA Multiplexer Register Definitions
//!
//! One configuration byte per channel, laid out contiguously from the
//! multiplexer base address.

use super::{Field, RegisterAccess};

/// Channel Configuration Registers base offset
pub const CHCFG_OFFSET: usize = 0x00;

/// DMA Channel Enable
pub const CHCFG_ENBL: u8 = 1 << 7;
/// DMA Channel Trigger Enable (periodic trigger mode)
pub const CHCFG_TRIG: u8 = 1 << 6;
/// DMA Channel Source (request slot)
pub const CHCFG_SOURCE: Field = Field::new(0, 6);

/// Power-on value of a channel configuration byte
pub const CHCFG_RESET: u8 = 0;

/// Register block of one DMAMUX instance
#[derive(Debug, Clone, Copy)]
pub struct DmaMuxRegs<R> {
    bus: R,
    base: usize,
}

impl<R: RegisterAccess> DmaMuxRegs<R> {
    /// Describe the register block at `base`
    pub const fn new(bus: R, base: usize) -> Self {
        Self { bus, base }
    }

    /// Get the base address
    #[inline(always)]
    pub const fn base(&self) -> usize {
        self.base
    }

    /// Address of a channel's configuration byte
    #[inline(always)]
    pub const fn chcfg_addr(&self, channel: usize) -> usize {
        self.base + CHCFG_OFFSET + channel
    }

    /// Read a channel's configuration byte
    #[inline(always)]
    pub fn channel_config(&self, channel: usize) -> u8 {
        self.bus.read8(self.chcfg_addr(channel))
    }

    /// Write a channel's configuration byte in a single store
    #[inline(always)]
    pub fn set_channel_config(&self, channel: usize, value: u8) {
        self.bus.write8(self.chcfg_addr(channel), value);
    }
}

/// Encode a channel configuration byte
#[must_use]
pub const fn encode_chcfg(enabled: bool, trigger: bool, source: u8) -> u8 {
    let mut value = CHCFG_SOURCE.set(0, source as u32) as u8;
    if enabled {
        value |= CHCFG_ENBL;
    }
    if trigger {
        value |= CHCFG_TRIG;
    }
    value
}
