//! Testing utilities and a simulated register bus
//!
//! [`MockBus`] is a byte-addressed memory that logs every store. Register
//! blocks registered with [`MockBus::add_edma`] also get the side effects of
//! the eDMA command registers, and [`MockBus::service`] runs one minor loop
//! the way the controller would.
//!
//! Only available when running `cargo test`.

// Note: The #[cfg(test)] attribute is applied in lib.rs where this module is declared
#![allow(missing_docs)]
#![allow(clippy::std_instead_of_core, clippy::std_instead_of_alloc)]

extern crate std;

use core::cell::RefCell;
use std::collections::HashMap;
use std::vec::Vec;

use crate::constants::{TCD_SIZE, TCD_WORDS};
use crate::driver::interrupt::{ChannelEvent, ErrorEvent};
use crate::register::edma::{
    CDNE_OFFSET, CEEI_OFFSET, CERQ_OFFSET, CERR_OFFSET, CINT_OFFSET, CMD_ALL, CMD_CHANNEL,
    CMD_NOP, EEIH_OFFSET, EEIL_OFFSET, ERQH_OFFSET, ERQL_OFFSET, ERRH_OFFSET, ERRL_OFFSET,
    ES_ERRCHN, ES_OFFSET, ES_VLD, INTH_OFFSET, INTL_OFFSET, SEEI_OFFSET, SERQ_OFFSET,
    SSRT_OFFSET, TCD_OFFSET,
};
use crate::register::{Endian, Field, RegisterAccess};
use crate::tcd::bits::{csr, iter, word};

// =============================================================================
// Mock Register Bus
// =============================================================================

/// One store observed on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusWrite {
    Byte(usize, u8),
    Word(usize, u32),
}

#[derive(Debug, Clone, Copy)]
struct EdmaSim {
    base: usize,
    channels: usize,
    endian: Endian,
}

impl EdmaSim {
    fn tcd(&self, channel: usize) -> usize {
        self.base + TCD_OFFSET + channel * TCD_SIZE
    }

    /// Split a channel into its (high, low) register offset and bit
    fn bank(channel: usize, high: usize, low: usize) -> (usize, u32) {
        if channel < 32 {
            (low, 1 << channel)
        } else {
            (high, 1 << (channel - 32))
        }
    }
}

/// Simulated register bus
///
/// # Example
///
/// ```ignore
/// let bus = MockBus::new();
/// bus.add_edma(BASE, 16, Endian::Little);
/// let controller = DmaController::init(&bus, &config)?;
/// controller.start(0)?;
/// assert!(bus.service(BASE, 0));
/// ```
#[derive(Debug, Default)]
pub struct MockBus {
    memory: RefCell<HashMap<usize, u8>>,
    write_log: RefCell<Vec<BusWrite>>,
    edma: RefCell<Vec<EdmaSim>>,
    arms: RefCell<HashMap<(usize, usize), u32>>,
}

impl MockBus {
    /// Create an empty bus; unwritten memory reads as zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all stores made through [`RegisterAccess`]
    pub fn writes(&self) -> Vec<BusWrite> {
        self.write_log.borrow().clone()
    }

    /// Clear the store log
    pub fn clear_writes(&self) {
        self.write_log.borrow_mut().clear();
    }

    /// Set a byte without logging or side effects
    pub fn poke8(&self, addr: usize, value: u8) {
        self.memory.borrow_mut().insert(addr, value);
    }

    /// Set a word without logging or side effects
    pub fn poke32(&self, addr: usize, value: u32) {
        for (i, byte) in value.to_le_bytes().into_iter().enumerate() {
            self.poke8(addr + i, byte);
        }
    }

    fn peek8(&self, addr: usize) -> u8 {
        self.memory.borrow().get(&addr).copied().unwrap_or(0)
    }

    /// Read a word without logging
    pub fn peek32(&self, addr: usize) -> u32 {
        let mut bytes = [0u8; 4];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = self.peek8(addr + i);
        }
        u32::from_le_bytes(bytes)
    }

    fn update32(&self, addr: usize, f: impl FnOnce(u32) -> u32) {
        let value = f(self.peek32(addr));
        self.poke32(addr, value);
    }

    /// Simulate an eDMA register block at `base`
    pub fn add_edma(&self, base: usize, channels: usize, endian: Endian) {
        self.edma.borrow_mut().push(EdmaSim {
            base,
            channels,
            endian,
        });
    }

    fn sim(&self, base: usize) -> EdmaSim {
        match self.edma.borrow().iter().find(|sim| sim.base == base) {
            Some(sim) => *sim,
            None => panic!("no eDMA simulated at {base:#x}"),
        }
    }

    fn command_target(&self, addr: usize) -> Option<(EdmaSim, usize)> {
        self.edma
            .borrow()
            .iter()
            .find(|sim| (sim.base + SERQ_OFFSET..=sim.base + CDNE_OFFSET).contains(&addr))
            .map(|sim| (*sim, addr - sim.base))
    }

    // -------------------------------------------------------------------------
    // eDMA behaviour
    // -------------------------------------------------------------------------

    fn set_channel_bit(&self, sim: &EdmaSim, channel: usize, high: usize, low: usize, set: bool) {
        let (offset, bit) = EdmaSim::bank(channel, high, low);
        self.update32(sim.base + offset, |v| if set { v | bit } else { v & !bit });
    }

    fn channel_bit(&self, sim: &EdmaSim, channel: usize, high: usize, low: usize) -> bool {
        let (offset, bit) = EdmaSim::bank(channel, high, low);
        self.peek32(sim.base + offset) & bit != 0
    }

    fn half(&self, addr: usize, field: Field) -> u32 {
        field.get(self.peek32(addr))
    }

    fn set_half(&self, addr: usize, field: Field, value: u32) {
        self.update32(addr, |v| field.set(v, value));
    }

    fn csr_addr(sim: &EdmaSim, channel: usize) -> usize {
        sim.tcd(channel) + 4 * word::BITER_CSR
    }

    fn update_csr(&self, sim: &EdmaSim, channel: usize, f: impl FnOnce(u32) -> u32) {
        let addr = Self::csr_addr(sim, channel);
        let field = sim.endian.low_half();
        let value = f(self.half(addr, field));
        self.set_half(addr, field, value);
    }

    fn command(&self, sim: EdmaSim, offset: usize, value: u8) {
        if value & CMD_NOP != 0 {
            return;
        }
        let targets = if value & CMD_ALL != 0 {
            0..sim.channels
        } else {
            let channel = CMD_CHANNEL.get(u32::from(value)) as usize;
            if channel >= sim.channels {
                return;
            }
            channel..channel + 1
        };

        for channel in targets {
            match offset {
                SERQ_OFFSET => self.set_channel_bit(&sim, channel, ERQH_OFFSET, ERQL_OFFSET, true),
                CERQ_OFFSET => self.set_channel_bit(&sim, channel, ERQH_OFFSET, ERQL_OFFSET, false),
                SEEI_OFFSET => self.set_channel_bit(&sim, channel, EEIH_OFFSET, EEIL_OFFSET, true),
                CEEI_OFFSET => self.set_channel_bit(&sim, channel, EEIH_OFFSET, EEIL_OFFSET, false),
                CINT_OFFSET => self.set_channel_bit(&sim, channel, INTH_OFFSET, INTL_OFFSET, false),
                CERR_OFFSET => self.set_channel_bit(&sim, channel, ERRH_OFFSET, ERRL_OFFSET, false),
                SSRT_OFFSET => self.update_csr(&sim, channel, |v| v | csr::START),
                CDNE_OFFSET => self.update_csr(&sim, channel, |v| v & !csr::DONE),
                _ => {}
            }
        }

        if offset == CERR_OFFSET
            && self.peek32(sim.base + ERRH_OFFSET) == 0
            && self.peek32(sim.base + ERRL_OFFSET) == 0
        {
            self.poke32(sim.base + ES_OFFSET, 0);
        }
    }

    fn arm(&self, sim: &EdmaSim, channel: usize) {
        self.update_csr(sim, channel, |v| v | csr::START);
        *self.arms.borrow_mut().entry((sim.base, channel)).or_insert(0) += 1;
    }

    /// Run one minor loop of `channel` if it has a software start or an
    /// enabled request pending. Returns whether a minor loop ran.
    ///
    /// Completing the major loop sets DONE, reloads CITER, raises the
    /// interrupt if enabled, clears ERQ if DREQ is set, arms the major link
    /// and loads the next descriptor for scatter-gather. Otherwise the minor
    /// link is armed.
    pub fn service(&self, base: usize, channel: usize) -> bool {
        let sim = self.sim(base);
        let tcd = sim.tcd(channel);
        let low = sim.endian.low_half();
        let high = sim.endian.high_half();

        let flags = self.half(tcd + 4 * word::BITER_CSR, low);
        let requested = self.channel_bit(&sim, channel, ERQH_OFFSET, ERQL_OFFSET);
        if flags & csr::START == 0 && !requested {
            return false;
        }
        let mut flags = flags & !(csr::START | csr::ACTIVE);

        let citer = self.half(tcd + 4 * word::CITER_DOFF, high);
        let biter = self.half(tcd + 4 * word::BITER_CSR, high);
        let linked = citer & iter::ELINK.mask() != 0;
        let count_field = if linked { iter::COUNT_LINKED } else { iter::COUNT };
        let remaining = count_field.get(citer).saturating_sub(1);

        if remaining == 0 {
            flags |= csr::DONE;
            self.set_half(tcd + 4 * word::CITER_DOFF, high, biter);
            self.set_half(tcd + 4 * word::BITER_CSR, low, flags);
            if flags & csr::INTMAJOR != 0 {
                self.set_channel_bit(&sim, channel, INTH_OFFSET, INTL_OFFSET, true);
            }
            if flags & csr::DREQ != 0 {
                self.set_channel_bit(&sim, channel, ERQH_OFFSET, ERQL_OFFSET, false);
            }
            if flags & csr::MAJORELINK != 0 {
                self.arm(&sim, csr::MAJORLINKCH.get(flags) as usize);
            }
            if flags & csr::ESG != 0 {
                let next = self.peek32(tcd + 4 * word::DLAST_SGA) as usize;
                for i in 0..TCD_WORDS {
                    self.poke32(tcd + 4 * i, self.peek32(next + 4 * i));
                }
            }
        } else {
            self.set_half(tcd + 4 * word::CITER_DOFF, high, count_field.set(citer, remaining));
            self.set_half(tcd + 4 * word::BITER_CSR, low, flags);
            let half_point = count_field.get(biter) / 2;
            if flags & csr::INTHALF != 0 && remaining == half_point {
                self.set_channel_bit(&sim, channel, INTH_OFFSET, INTL_OFFSET, true);
            }
            if linked {
                self.arm(&sim, iter::LINKCH.get(citer) as usize);
            }
        }
        true
    }

    /// Number of times `channel` was started by a channel link
    pub fn arm_count(&self, base: usize, channel: usize) -> u32 {
        self.arms
            .borrow()
            .get(&(base, channel))
            .copied()
            .unwrap_or(0)
    }

    /// Latch an error on `channel` with the given ES condition bits
    pub fn raise_error(&self, base: usize, channel: usize, es_bits: u32) {
        let sim = self.sim(base);
        self.poke32(base + ES_OFFSET, ES_VLD | es_bits | ES_ERRCHN.set(0, channel as u32));
        self.set_channel_bit(&sim, channel, ERRH_OFFSET, ERRL_OFFSET, true);
    }

    /// Set CSR bits of `channel` as the hardware would
    pub fn set_channel_flags(&self, base: usize, channel: usize, bits: u32) {
        let sim = self.sim(base);
        self.update_csr(&sim, channel, |v| v | bits);
    }
}

impl RegisterAccess for MockBus {
    fn read32(&self, addr: usize) -> u32 {
        self.peek32(addr)
    }

    fn write32(&self, addr: usize, value: u32) {
        self.write_log.borrow_mut().push(BusWrite::Word(addr, value));
        self.poke32(addr, value);
    }

    fn read8(&self, addr: usize) -> u8 {
        self.peek8(addr)
    }

    fn write8(&self, addr: usize, value: u8) {
        self.write_log.borrow_mut().push(BusWrite::Byte(addr, value));
        match self.command_target(addr) {
            Some((sim, offset)) => self.command(sim, offset, value),
            None => self.poke8(addr, value),
        }
    }
}

// =============================================================================
// Mock Delay
// =============================================================================

/// Delay provider that only accumulates the requested time
#[derive(Debug, Default)]
pub struct MockDelay {
    total_ns: RefCell<u64>,
}

impl MockDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total microseconds that were "delayed"
    pub fn total_us(&self) -> u64 {
        *self.total_ns.borrow() / 1_000
    }
}

impl embedded_hal::delay::DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        *self.total_ns.borrow_mut() += u64::from(ns);
    }
}

// =============================================================================
// Notification recorders
// =============================================================================

std::thread_local! {
    static CHANNEL_EVENTS: RefCell<Vec<ChannelEvent>> = const { RefCell::new(Vec::new()) };
    static ERROR_EVENTS: RefCell<Vec<ErrorEvent>> = const { RefCell::new(Vec::new()) };
    static DIAGNOSTIC_EVENTS: RefCell<Vec<ErrorEvent>> = const { RefCell::new(Vec::new()) };
}

/// Channel notification that records into a per-thread log
pub fn record_channel_event(event: ChannelEvent) {
    CHANNEL_EVENTS.with(|events| events.borrow_mut().push(event));
}

/// Drain the channel notification log of this thread
pub fn take_channel_events() -> Vec<ChannelEvent> {
    CHANNEL_EVENTS.with(|events| events.take())
}

/// Error notification that records into a per-thread log
pub fn record_error_event(event: ErrorEvent) {
    ERROR_EVENTS.with(|events| events.borrow_mut().push(event));
}

/// Drain the error notification log of this thread
pub fn take_error_events() -> Vec<ErrorEvent> {
    ERROR_EVENTS.with(|events| events.take())
}

/// Diagnostic hook that records into a per-thread log
pub fn record_diagnostic_event(event: ErrorEvent) {
    DIAGNOSTIC_EVENTS.with(|events| events.borrow_mut().push(event));
}

/// Drain the diagnostic log of this thread
pub fn take_diagnostic_events() -> Vec<ErrorEvent> {
    DIAGNOSTIC_EVENTS.with(|events| events.take())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    extern crate std;
    use std::vec;

    use super::*;

    const BASE: usize = 0x4000_8000;

    #[test]
    fn memory_is_little_endian() {
        let bus = MockBus::new();
        bus.write32(0x100, 0x1122_3344);
        assert_eq!(bus.read8(0x100), 0x44);
        assert_eq!(bus.read8(0x103), 0x11);
        assert_eq!(bus.writes(), vec![BusWrite::Word(0x100, 0x1122_3344)]);
    }

    #[test]
    fn command_registers_act_instead_of_storing() {
        let bus = MockBus::new();
        bus.add_edma(BASE, 16, Endian::Little);

        bus.write8(BASE + SERQ_OFFSET, 3);
        bus.write8(BASE + SERQ_OFFSET, CMD_NOP | 4);
        assert_eq!(bus.read32(BASE + ERQL_OFFSET), 1 << 3);
        assert_eq!(bus.read8(BASE + SERQ_OFFSET), 0);

        bus.write8(BASE + SEEI_OFFSET, CMD_ALL);
        assert_eq!(bus.read32(BASE + EEIL_OFFSET), 0xFFFF);
    }

    #[test]
    fn clearing_last_error_clears_status() {
        let bus = MockBus::new();
        bus.add_edma(BASE, 16, Endian::Little);
        bus.raise_error(BASE, 2, 1);
        bus.raise_error(BASE, 5, 1);

        bus.write8(BASE + CERR_OFFSET, 2);
        assert_ne!(bus.read32(BASE + ES_OFFSET), 0);
        bus.write8(BASE + CERR_OFFSET, 5);
        assert_eq!(bus.read32(BASE + ES_OFFSET), 0);
    }

    #[test]
    fn idle_channel_is_not_serviced() {
        let bus = MockBus::new();
        bus.add_edma(BASE, 16, Endian::Big);
        assert!(!bus.service(BASE, 0));
        assert_eq!(bus.arm_count(BASE, 0), 0);
    }

    #[test]
    fn recorders_drain() {
        assert!(take_channel_events().is_empty());
        assert!(take_error_events().is_empty());
        assert!(take_diagnostic_events().is_empty());
    }
}
