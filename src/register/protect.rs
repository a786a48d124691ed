//! Register protection ("soft lock") support
//!
//! On parts with register protection, each 32-bit register word of a
//! protected module has a Soft Lock Bit Register (SLBR) byte at
//! `module_base + 0x3800 + offset / 4`. Bits 3:0 lock the four bytes of the
//! word, bits 7:4 are write enables for those lock bits.
//!
//! Reduced-privilege code must clear the lock before writing and set it
//! again afterwards. The three steps are only reachable together through
//! [`protected_write8`], which runs them inside one critical section.

use super::RegisterAccess;

/// Offset of the Soft Lock Bit Registers from the protected module base
pub const SLBR_OFFSET: usize = 0x3800;

/// Write enable for the soft lock bit of byte `lane` (0..=3)
#[inline(always)]
pub const fn slbr_we(lane: usize) -> u8 {
    1 << (4 + lane)
}

/// Soft lock bit of byte `lane` (0..=3)
#[inline(always)]
pub const fn slbr_slb(lane: usize) -> u8 {
    1 << lane
}

/// Protection mode of a register block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Protection {
    /// Registers are written directly
    #[default]
    Unprotected,
    /// Registers sit behind soft lock bits that must be cleared before writing
    SoftLock,
}

/// Scoped soft-lock release.
///
/// Clears the lock bit on acquisition and sets it again on drop, on every
/// exit path.
pub(crate) struct SoftLockGuard<'a, R: RegisterAccess> {
    bus: &'a R,
    slbr: usize,
    lane: usize,
}

impl<'a, R: RegisterAccess> SoftLockGuard<'a, R> {
    /// Unlock the byte at `addr` of the module at `module_base`
    pub(crate) fn acquire(bus: &'a R, module_base: usize, addr: usize) -> Self {
        let offset = addr - module_base;
        let guard = Self {
            bus,
            slbr: module_base + SLBR_OFFSET + offset / 4,
            lane: offset % 4,
        };
        guard.bus.write8(guard.slbr, slbr_we(guard.lane));
        guard
    }
}

impl<R: RegisterAccess> Drop for SoftLockGuard<'_, R> {
    fn drop(&mut self) {
        self.bus
            .write8(self.slbr, slbr_we(self.lane) | slbr_slb(self.lane));
    }
}

/// Write a protected byte register as one uninterruptible sequence.
///
/// With [`Protection::SoftLock`] this is clear lock, write, relock. With
/// [`Protection::Unprotected`] it is a plain write.
pub fn protected_write8<R: RegisterAccess>(
    bus: &R,
    protection: Protection,
    module_base: usize,
    addr: usize,
    value: u8,
) {
    critical_section::with(|_| match protection {
        Protection::SoftLock => {
            let _unlocked = SoftLockGuard::acquire(bus, module_base, addr);
            bus.write8(addr, value);
        }
        Protection::Unprotected => bus.write8(addr, value),
    });
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::vec;

    use super::*;
    use crate::testing::{BusWrite, MockBus};

    const BASE: usize = 0x4000_8000;

    #[test]
    fn soft_lock_sequence_is_unlock_write_relock() {
        let bus = MockBus::new();
        let addr = BASE + 0x106;

        protected_write8(&bus, Protection::SoftLock, BASE, addr, 0x85);

        let slbr = BASE + SLBR_OFFSET + 0x106 / 4;
        assert_eq!(
            bus.writes(),
            vec![
                BusWrite::Byte(slbr, 0x40),
                BusWrite::Byte(addr, 0x85),
                BusWrite::Byte(slbr, 0x44),
            ]
        );
    }

    #[test]
    fn unprotected_write_is_single_store() {
        let bus = MockBus::new();
        protected_write8(&bus, Protection::Unprotected, BASE, BASE + 0x100, 0x0F);
        assert_eq!(bus.writes(), vec![BusWrite::Byte(BASE + 0x100, 0x0F)]);
    }

    #[test]
    fn guard_relocks_on_drop() {
        let bus = MockBus::new();
        {
            let _guard = SoftLockGuard::acquire(&bus, BASE, BASE + 0x101);
            assert_eq!(bus.read8(BASE + SLBR_OFFSET + 0x40), slbr_we(1));
        }
        assert_eq!(bus.read8(BASE + SLBR_OFFSET + 0x40), slbr_we(1) | slbr_slb(1));
    }
}
