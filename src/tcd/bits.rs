//! Transfer control descriptor bit field constants.
//!
//! A TCD is eight 32-bit words. Words 1, 5 and 7 each pack two 16-bit
//! fields; which half of the word holds which field depends on the bus
//! byte order (see [`Endian`](crate::register::Endian)). The constants in
//! [`attr`], [`iter`] and [`csr`] are positions within the 16-bit field.

use crate::register::Field;

/// Word indices within a TCD, in the order they are written
pub mod word {
    /// Source address
    pub const SADDR: usize = 0;
    /// Transfer attributes (high address half) and signed source offset (low address half)
    pub const ATTR_SOFF: usize = 1;
    /// Minor loop byte count
    pub const NBYTES: usize = 2;
    /// Last source address adjustment
    pub const SLAST: usize = 3;
    /// Destination address
    pub const DADDR: usize = 4;
    /// Current major iteration count (high half) and signed destination
    /// offset (low half)
    pub const CITER_DOFF: usize = 5;
    /// Last destination address adjustment or scatter-gather address
    pub const DLAST_SGA: usize = 6;
    /// Beginning major iteration count (high address half) and control/status (low address half)
    pub const BITER_CSR: usize = 7;
}

/// Transfer attribute (ATTR) fields
pub mod attr {
    use super::Field;

    /// Destination data transfer size
    pub const DSIZE: Field = Field::new(0, 3);
    /// Destination address modulo
    pub const DMOD: Field = Field::new(3, 5);
    /// Source data transfer size
    pub const SSIZE: Field = Field::new(8, 3);
    /// Source address modulo
    pub const SMOD: Field = Field::new(11, 5);
}

/// Major iteration count (CITER/BITER) fields
pub mod iter {
    use super::Field;

    /// Enable channel-to-channel linking on minor loop completion
    pub const ELINK: Field = Field::bit(15);
    /// Minor loop link channel number (when ELINK is set)
    pub const LINKCH: Field = Field::new(9, 6);
    /// Iteration count when ELINK is set (9 bits)
    pub const COUNT_LINKED: Field = Field::new(0, 9);
    /// Iteration count when ELINK is clear (15 bits)
    pub const COUNT: Field = Field::new(0, 15);
}

/// Control and status (CSR) fields
pub mod csr {
    use super::Field;

    /// Channel start - set by software or SSRT, cleared by hardware on activation
    pub const START: u32 = 1 << 0;
    /// Interrupt when the major iteration count completes
    pub const INTMAJOR: u32 = 1 << 1;
    /// Interrupt when the major counter is half complete
    pub const INTHALF: u32 = 1 << 2;
    /// Disable request (clear ERQ) when the major iteration count completes
    pub const DREQ: u32 = 1 << 3;
    /// Enable scatter/gather processing
    pub const ESG: u32 = 1 << 4;
    /// Enable channel-to-channel linking on major loop completion
    pub const MAJORELINK: u32 = 1 << 5;
    /// Channel active - set by hardware while the channel executes
    pub const ACTIVE: u32 = 1 << 6;
    /// Channel done - set by hardware when the major iteration count completes
    pub const DONE: u32 = 1 << 7;
    /// Major loop link channel number
    pub const MAJORLINKCH: Field = Field::new(8, 6);
    /// Bandwidth control
    pub const BWC: Field = Field::new(14, 2);

    /// Interrupt enable bits checked by the interrupt dispatcher
    pub const INT_ENABLES: u32 = INTMAJOR | INTHALF;

    /// Bits owned by hardware status tracking
    pub const STATUS: u32 = START | ACTIVE | DONE;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attr_fields_fill_sixteen_bits() {
        let all = attr::DSIZE.mask() | attr::DMOD.mask() | attr::SSIZE.mask() | attr::SMOD.mask();
        assert_eq!(all, 0xFFFF);
    }

    #[test]
    fn linked_iteration_layout() {
        let all = iter::ELINK.mask() | iter::LINKCH.mask() | iter::COUNT_LINKED.mask();
        assert_eq!(all, 0xFFFF);
        assert_eq!(iter::COUNT.mask(), 0x7FFF);
    }

    #[test]
    fn csr_flags_are_low_byte() {
        let flags = csr::START
            | csr::INTMAJOR
            | csr::INTHALF
            | csr::DREQ
            | csr::ESG
            | csr::MAJORELINK
            | csr::ACTIVE
            | csr::DONE;
        assert_eq!(flags, 0xFF);
        assert_eq!(csr::MAJORLINKCH.mask() | csr::BWC.mask(), 0xFF00);
    }
}
