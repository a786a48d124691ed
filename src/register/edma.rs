//! eDMA Controller Register Definitions
//!
//! One register block per controller instance. Channel-indexed command
//! registers (SERQ, CERQ, SEEI, CEEI, CINT, CERR, SSRT, CDNE) take a channel
//! number in bits 5:0, or the "all channels" flag in bit 6.

use super::{Endian, Field, RegisterAccess, reg_cmd8, reg_ro, reg_rw};
use crate::constants::TCD_SIZE;

// =============================================================================
// Register Offsets
// =============================================================================

/// Control Register offset
pub const CR_OFFSET: usize = 0x00;
/// Error Status Register offset
pub const ES_OFFSET: usize = 0x04;
/// Enable Request Register High (channels 63:32) offset
pub const ERQH_OFFSET: usize = 0x08;
/// Enable Request Register Low (channels 31:0) offset
pub const ERQL_OFFSET: usize = 0x0C;
/// Enable Error Interrupt Register High offset
pub const EEIH_OFFSET: usize = 0x10;
/// Enable Error Interrupt Register Low offset
pub const EEIL_OFFSET: usize = 0x14;
/// Set Enable Request Register offset (byte)
pub const SERQ_OFFSET: usize = 0x18;
/// Clear Enable Request Register offset (byte)
pub const CERQ_OFFSET: usize = 0x19;
/// Set Enable Error Interrupt Register offset (byte)
pub const SEEI_OFFSET: usize = 0x1A;
/// Clear Enable Error Interrupt Register offset (byte)
pub const CEEI_OFFSET: usize = 0x1B;
/// Clear Interrupt Request Register offset (byte)
pub const CINT_OFFSET: usize = 0x1C;
/// Clear Error Register offset (byte)
pub const CERR_OFFSET: usize = 0x1D;
/// Set START Bit Register offset (byte)
pub const SSRT_OFFSET: usize = 0x1E;
/// Clear DONE Status Bit Register offset (byte)
pub const CDNE_OFFSET: usize = 0x1F;
/// Interrupt Request Register High offset
pub const INTH_OFFSET: usize = 0x20;
/// Interrupt Request Register Low offset
pub const INTL_OFFSET: usize = 0x24;
/// Error Register High offset
pub const ERRH_OFFSET: usize = 0x28;
/// Error Register Low offset
pub const ERRL_OFFSET: usize = 0x2C;
/// Hardware Request Status Register High offset
pub const HRSH_OFFSET: usize = 0x30;
/// Hardware Request Status Register Low offset
pub const HRSL_OFFSET: usize = 0x34;
/// Channel Priority Registers base offset (one byte per channel)
pub const DCHPRI_OFFSET: usize = 0x100;
/// Channel Master ID Registers base offset (one byte per channel)
pub const DCHMID_OFFSET: usize = 0x140;
/// Transfer Control Descriptor table offset
pub const TCD_OFFSET: usize = 0x1000;

// =============================================================================
// Control Register (CR) Bits
// =============================================================================

/// Enable Debug - stall new channel starts while the debugger halts the core
pub const CR_EDBG: u32 = 1 << 1;
/// Enable Round Robin Channel Arbitration
pub const CR_ERCA: u32 = 1 << 2;
/// Enable Round Robin Group Arbitration
pub const CR_ERGA: u32 = 1 << 3;
/// Halt On Error
pub const CR_HOE: u32 = 1 << 4;
/// Halt DMA Operations
pub const CR_HALT: u32 = 1 << 5;
/// Continuous Link Mode
pub const CR_CLM: u32 = 1 << 6;
/// Enable Minor Loop Mapping
pub const CR_EMLM: u32 = 1 << 7;
/// Group 0 priority (channels 15:0)
pub const CR_GRP0PRI: Field = Field::new(8, 2);
/// Group 1 priority (channels 31:16)
pub const CR_GRP1PRI: Field = Field::new(10, 2);
/// Group 2 priority (channels 47:32)
pub const CR_GRP2PRI: Field = Field::new(12, 2);
/// Group 3 priority (channels 63:48)
pub const CR_GRP3PRI: Field = Field::new(14, 2);
/// Error Cancel Transfer - cancel the active transfer and report an error
pub const CR_ECX: u32 = 1 << 16;
/// Cancel Transfer - cancel the active transfer without error
pub const CR_CX: u32 = 1 << 17;
/// DMA Active Status (read-only)
pub const CR_ACTIVE: u32 = 1 << 31;

/// Group priority fields, indexed by group
pub const CR_GRPPRI: [Field; 4] = [CR_GRP0PRI, CR_GRP1PRI, CR_GRP2PRI, CR_GRP3PRI];

// =============================================================================
// Error Status Register (ES) Bits
// =============================================================================

/// Destination Bus Error
pub const ES_DBE: u32 = 1 << 0;
/// Source Bus Error
pub const ES_SBE: u32 = 1 << 1;
/// Scatter/Gather Configuration Error
pub const ES_SGE: u32 = 1 << 2;
/// NBYTES/CITER Configuration Error
pub const ES_NCE: u32 = 1 << 3;
/// Destination Offset Error
pub const ES_DOE: u32 = 1 << 4;
/// Destination Address Error
pub const ES_DAE: u32 = 1 << 5;
/// Source Offset Error
pub const ES_SOE: u32 = 1 << 6;
/// Source Address Error
pub const ES_SAE: u32 = 1 << 7;
/// Error Channel Number
pub const ES_ERRCHN: Field = Field::new(8, 6);
/// Channel Priority Error
pub const ES_CPE: u32 = 1 << 14;
/// Group Priority Error
pub const ES_GPE: u32 = 1 << 15;
/// Transfer Cancelled
pub const ES_ECX: u32 = 1 << 16;
/// Uncorrectable ECC Error during channel execution
pub const ES_UCE: u32 = 1 << 17;
/// Logical OR of all ERR status bits
pub const ES_VLD: u32 = 1 << 31;

/// Bus error bits
pub const ES_BUS_ERRORS: u32 = ES_DBE | ES_SBE;

/// Descriptor configuration error bits
pub const ES_DESCRIPTOR_ERRORS: u32 = ES_SGE | ES_NCE | ES_DOE | ES_DAE | ES_SOE | ES_SAE;

/// Priority configuration error bits
pub const ES_PRIORITY_ERRORS: u32 = ES_CPE | ES_GPE;

/// All error condition bits (excluding the channel number and VLD)
pub const ES_ALL_ERRORS: u32 =
    ES_UCE | ES_BUS_ERRORS | ES_DESCRIPTOR_ERRORS | ES_PRIORITY_ERRORS | ES_ECX;

// =============================================================================
// Channel Command Registers (SERQ, CERQ, SEEI, CEEI, CINT, CERR, SSRT, CDNE)
// =============================================================================

/// Channel number field of a command register
pub const CMD_CHANNEL: Field = Field::new(0, 6);
/// Apply the command to all channels
pub const CMD_ALL: u8 = 1 << 6;
/// No operation - ignore the write
pub const CMD_NOP: u8 = 1 << 7;

// =============================================================================
// Channel Priority (DCHPRI) and Master ID (DCHMID) Bits
// =============================================================================

/// Channel arbitration priority within its group
pub const DCHPRI_CHPRI: Field = Field::new(0, 4);
/// Channel current group priority (read-only)
pub const DCHPRI_GRPPRI: Field = Field::new(4, 2);
/// Disable Preempt Ability - set when this channel may not preempt others
pub const DCHPRI_DPA: u8 = 1 << 6;
/// Enable Channel Preemption - set when this channel may be preempted
pub const DCHPRI_ECP: u8 = 1 << 7;

/// Master ID replicated on the bus while the channel is active
pub const DCHMID_MID: Field = Field::new(0, 4);
/// Privileged access level replicated while the channel is active (read-only)
pub const DCHMID_PAL: u8 = 1 << 6;
/// Enable Master ID replication
pub const DCHMID_EMI: u8 = 1 << 7;

// =============================================================================
// eDMA Register Access
// =============================================================================

/// Register block of one eDMA controller instance
#[derive(Debug, Clone, Copy)]
pub struct EdmaRegs<R> {
    bus: R,
    base: usize,
    endian: Endian,
}

impl<R: RegisterAccess> EdmaRegs<R> {
    /// Describe the register block at `base`
    pub const fn new(bus: R, base: usize, endian: Endian) -> Self {
        Self { bus, base, endian }
    }

    /// Get the base address
    #[inline(always)]
    pub const fn base(&self) -> usize {
        self.base
    }

    /// Get the byte-lane order
    #[inline(always)]
    pub const fn endian(&self) -> Endian {
        self.endian
    }

    /// Get the underlying bus
    #[inline(always)]
    pub const fn bus(&self) -> &R {
        &self.bus
    }

    // -------------------------------------------------------------------------
    // Register accessors (generated by macros)
    // -------------------------------------------------------------------------

    reg_rw!(control, set_control, CR_OFFSET, "Control register");
    reg_ro!(error_status, ES_OFFSET, "Error Status register");
    reg_ro!(enable_request_high, ERQH_OFFSET, "Enable Request register (high)");
    reg_ro!(enable_request_low, ERQL_OFFSET, "Enable Request register (low)");
    reg_ro!(enable_error_interrupt_high, EEIH_OFFSET, "Enable Error Interrupt register (high)");
    reg_ro!(enable_error_interrupt_low, EEIL_OFFSET, "Enable Error Interrupt register (low)");
    reg_ro!(interrupt_request_high, INTH_OFFSET, "Interrupt Request register (high)");
    reg_ro!(interrupt_request_low, INTL_OFFSET, "Interrupt Request register (low)");
    reg_ro!(error_request_high, ERRH_OFFSET, "Error register (high)");
    reg_ro!(error_request_low, ERRL_OFFSET, "Error register (low)");
    reg_ro!(hardware_request_high, HRSH_OFFSET, "Hardware Request Status register (high)");
    reg_ro!(hardware_request_low, HRSL_OFFSET, "Hardware Request Status register (low)");

    reg_cmd8!(set_enable_request, SERQ_OFFSET, "Set Enable Request");
    reg_cmd8!(clear_enable_request, CERQ_OFFSET, "Clear Enable Request");
    reg_cmd8!(set_enable_error_interrupt, SEEI_OFFSET, "Set Enable Error Interrupt");
    reg_cmd8!(clear_enable_error_interrupt, CEEI_OFFSET, "Clear Enable Error Interrupt");
    reg_cmd8!(clear_interrupt_request, CINT_OFFSET, "Clear Interrupt Request");
    reg_cmd8!(clear_error, CERR_OFFSET, "Clear Error");
    reg_cmd8!(set_start, SSRT_OFFSET, "Set START Bit");
    reg_cmd8!(clear_done, CDNE_OFFSET, "Clear DONE Status Bit");

    // -------------------------------------------------------------------------
    // Channel-indexed helpers
    // -------------------------------------------------------------------------

    /// Address of a channel's priority byte
    #[inline(always)]
    pub const fn dchpri_addr(&self, channel: usize) -> usize {
        self.base + DCHPRI_OFFSET + self.endian.byte_lane(channel)
    }

    /// Address of a channel's master ID byte
    #[inline(always)]
    pub const fn dchmid_addr(&self, channel: usize) -> usize {
        self.base + DCHMID_OFFSET + self.endian.byte_lane(channel)
    }

    /// Address of a channel's TCD slot
    #[inline(always)]
    pub const fn tcd_addr(&self, channel: usize) -> usize {
        self.base + TCD_OFFSET + channel * TCD_SIZE
    }

    /// Read a channel's priority byte
    #[inline(always)]
    pub fn channel_priority(&self, channel: usize) -> u8 {
        self.bus.read8(self.dchpri_addr(channel))
    }

    /// Read a channel's master ID byte
    #[inline(always)]
    pub fn channel_master_id(&self, channel: usize) -> u8 {
        self.bus.read8(self.dchmid_addr(channel))
    }

    /// Write a channel's master ID byte
    #[inline(always)]
    pub fn set_channel_master_id(&self, channel: usize, value: u8) {
        self.bus.write8(self.dchmid_addr(channel), value);
    }

    /// Check a channel's bit in a High/Low register pair
    #[inline(always)]
    fn channel_bit(high: u32, low: u32, channel: usize) -> bool {
        let word = if channel < 32 { low } else { high };
        word & (1 << (channel % 32)) != 0
    }

    /// Check if a channel's hardware request is enabled
    pub fn is_request_enabled(&self, channel: usize) -> bool {
        let (high, low) = (self.enable_request_high(), self.enable_request_low());
        Self::channel_bit(high, low, channel)
    }

    /// Check if a channel's error interrupt is enabled
    pub fn is_error_interrupt_enabled(&self, channel: usize) -> bool {
        let (high, low) = (self.enable_error_interrupt_high(), self.enable_error_interrupt_low());
        Self::channel_bit(high, low, channel)
    }

    /// Check if a channel has an interrupt request pending
    pub fn is_interrupt_pending(&self, channel: usize) -> bool {
        let (high, low) = (self.interrupt_request_high(), self.interrupt_request_low());
        Self::channel_bit(high, low, channel)
    }

    /// Check if a channel has an error latched
    pub fn is_error_pending(&self, channel: usize) -> bool {
        let (high, low) = (self.error_request_high(), self.error_request_low());
        Self::channel_bit(high, low, channel)
    }

    /// Check if a channel's peripheral request line is asserted
    pub fn is_hardware_request_pending(&self, channel: usize) -> bool {
        let (high, low) = (self.hardware_request_high(), self.hardware_request_low());
        Self::channel_bit(high, low, channel)
    }

    /// Pending interrupt requests as one 64-bit mask
    pub fn interrupt_requests(&self) -> u64 {
        (u64::from(self.interrupt_request_high()) << 32) | u64::from(self.interrupt_request_low())
    }

    /// Latched channel errors as one 64-bit mask
    pub fn error_requests(&self) -> u64 {
        (u64::from(self.error_request_high()) << 32) | u64::from(self.error_request_low())
    }

    /// Set Control register bits
    #[inline(always)]
    pub fn set_control_bits(&self, bits: u32) {
        self.bus.set_bits(self.base + CR_OFFSET, bits);
    }

    /// Clear Control register bits
    #[inline(always)]
    pub fn clear_control_bits(&self, bits: u32) {
        self.bus.clear_bits(self.base + CR_OFFSET, bits);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBus;

    const BASE: usize = 0x4000_8000;

    #[test]
    fn offsets_match_layout() {
        assert_eq!(SERQ_OFFSET, 0x18);
        assert_eq!(CDNE_OFFSET, 0x1F);
        assert_eq!(INTL_OFFSET, 0x24);
        assert_eq!(TCD_OFFSET, 0x1000);
    }

    #[test]
    fn error_groups_are_disjoint() {
        assert_eq!(ES_BUS_ERRORS & ES_DESCRIPTOR_ERRORS, 0);
        assert_eq!(ES_BUS_ERRORS & ES_PRIORITY_ERRORS, 0);
        assert_eq!(ES_DESCRIPTOR_ERRORS & ES_PRIORITY_ERRORS, 0);
        assert_eq!(ES_ALL_ERRORS & ES_ERRCHN.mask(), 0);
        assert_eq!(ES_ALL_ERRORS & ES_VLD, 0);
    }

    #[test]
    fn group_priority_fields_do_not_overlap() {
        let mut seen = 0u32;
        for field in CR_GRPPRI {
            assert_eq!(seen & field.mask(), 0);
            seen |= field.mask();
        }
        assert_eq!(seen, 0xFF00);
    }

    #[test]
    fn priority_bytes_follow_endian() {
        let bus = MockBus::new();
        let little = EdmaRegs::new(&bus, BASE, Endian::Little);
        let big = EdmaRegs::new(&bus, BASE, Endian::Big);

        assert_eq!(little.dchpri_addr(0), BASE + 0x103);
        assert_eq!(little.dchpri_addr(4), BASE + 0x107);
        assert_eq!(big.dchpri_addr(0), BASE + 0x100);
        assert_eq!(big.dchmid_addr(1), BASE + 0x141);
    }

    #[test]
    fn tcd_slots_are_32_bytes_apart() {
        let bus = MockBus::new();
        let regs = EdmaRegs::new(&bus, BASE, Endian::Little);
        assert_eq!(regs.tcd_addr(0), BASE + 0x1000);
        assert_eq!(regs.tcd_addr(5), BASE + 0x10A0);
    }

    #[test]
    fn channel_bits_split_across_high_and_low() {
        let bus = MockBus::new();
        let regs = EdmaRegs::new(&bus, BASE, Endian::Little);
        bus.write32(BASE + INTL_OFFSET, 1 << 3);
        bus.write32(BASE + INTH_OFFSET, 1 << 1);

        assert!(regs.is_interrupt_pending(3));
        assert!(regs.is_interrupt_pending(33));
        assert!(!regs.is_interrupt_pending(1));
        assert_eq!(regs.interrupt_requests(), (1u64 << 33) | (1 << 3));
    }

    #[test]
    fn control_bit_helpers() {
        let bus = MockBus::new();
        let regs = EdmaRegs::new(&bus, BASE, Endian::Little);
        regs.set_control(CR_ERCA);
        regs.set_control_bits(CR_HALT);
        assert_eq!(regs.control(), CR_ERCA | CR_HALT);
        regs.clear_control_bits(CR_HALT);
        assert_eq!(regs.control(), CR_ERCA);
    }
}
