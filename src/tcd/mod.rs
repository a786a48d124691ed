//! Transfer control descriptor (TCD) construction and decoding.
//!
//! [`TransferAttributes`] is the caller-facing description of a transfer.
//! [`TcdWords`] is its encoded form: the eight 32-bit words the controller
//! reads, with every packed field reachable through a typed accessor.
//!
//! Encoding selects the iteration-count width from the linking mode: 9 bits
//! when minor-loop channel linking is enabled, 15 bits otherwise. Counts
//! that do not fit are masked to the field width, as the hardware itself
//! would, and a warning is logged.

pub mod bits;
pub mod chain;
pub mod storage;

pub use chain::validate_next;
pub use storage::{TcdAddress, TcdStorage};

use crate::constants::TCD_WORDS;
use crate::error::{TcdError, TcdResult};
use crate::register::{Endian, Field, RegisterAccess};
use bits::{attr, csr, iter, word};

/// Largest address modulo accepted by the 5-bit SMOD/DMOD fields
pub const MAX_MODULO: u8 = 31;

// =============================================================================
// Transfer Attributes
// =============================================================================

/// Data transfer size of one read or write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum TransferSize {
    /// 1 byte
    #[default]
    Bits8 = 0,
    /// 2 bytes
    Bits16 = 1,
    /// 4 bytes
    Bits32 = 2,
    /// 8 bytes
    Bits64 = 3,
    /// 16-byte burst
    Bytes16 = 4,
    /// 32-byte burst
    Bytes32 = 5,
}

impl TransferSize {
    /// Encoded SSIZE/DSIZE value
    #[must_use]
    pub const fn to_bits(self) -> u32 {
        self as u32
    }

    /// Decode an SSIZE/DSIZE value; reserved encodings yield `None`
    #[must_use]
    pub const fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0 => Some(Self::Bits8),
            1 => Some(Self::Bits16),
            2 => Some(Self::Bits32),
            3 => Some(Self::Bits64),
            4 => Some(Self::Bytes16),
            5 => Some(Self::Bytes32),
            _ => None,
        }
    }

    /// Number of bytes moved per access
    #[must_use]
    pub const fn bytes(self) -> u32 {
        match self {
            Self::Bits8 => 1,
            Self::Bits16 => 2,
            Self::Bits32 => 4,
            Self::Bits64 => 8,
            Self::Bytes16 => 16,
            Self::Bytes32 => 32,
        }
    }
}

/// Caller-supplied description of one transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransferAttributes {
    /// Source bus address
    pub source_address: u32,
    /// Destination bus address
    pub destination_address: u32,
    /// Source read size
    pub source_size: TransferSize,
    /// Destination write size
    pub destination_size: TransferSize,
    /// Signed increment applied to the source address after each read
    pub source_offset: i16,
    /// Signed increment applied to the destination address after each write
    pub destination_offset: i16,
    /// Source address modulo (0 disables, otherwise the number of low bits that wrap)
    pub source_modulo: u8,
    /// Destination address modulo
    pub destination_modulo: u8,
    /// Bytes moved per minor loop
    pub minor_loop_bytes: u32,
    /// Major loop iteration count
    pub iteration_count: u16,
    /// Adjustment added to the source address when the major loop completes
    pub source_last_adjustment: i32,
    /// Adjustment added to the destination address when the major loop
    /// completes (replaced by the next descriptor address under scatter-gather)
    pub destination_last_adjustment: i32,
    /// Raise an interrupt when the major loop completes
    pub interrupt_on_major: bool,
    /// Raise an interrupt when the major loop is half complete
    pub interrupt_on_half: bool,
    /// Clear the hardware request enable when the major loop completes
    pub disable_request_on_completion: bool,
}

impl TransferAttributes {
    /// Create attributes for a memory-to-memory style transfer
    #[must_use]
    pub const fn new(source_address: u32, destination_address: u32) -> Self {
        Self {
            source_address,
            destination_address,
            source_size: TransferSize::Bits8,
            destination_size: TransferSize::Bits8,
            source_offset: 0,
            destination_offset: 0,
            source_modulo: 0,
            destination_modulo: 0,
            minor_loop_bytes: 0,
            iteration_count: 1,
            source_last_adjustment: 0,
            destination_last_adjustment: 0,
            interrupt_on_major: false,
            interrupt_on_half: false,
            disable_request_on_completion: false,
        }
    }

    /// Set source and destination access sizes
    #[must_use]
    pub const fn with_sizes(mut self, source: TransferSize, destination: TransferSize) -> Self {
        self.source_size = source;
        self.destination_size = destination;
        self
    }

    /// Set per-access address increments
    #[must_use]
    pub const fn with_offsets(mut self, source: i16, destination: i16) -> Self {
        self.source_offset = source;
        self.destination_offset = destination;
        self
    }

    /// Set address modulo (circular buffer) widths
    #[must_use]
    pub const fn with_modulo(mut self, source: u8, destination: u8) -> Self {
        self.source_modulo = source;
        self.destination_modulo = destination;
        self
    }

    /// Set the minor loop byte count
    #[must_use]
    pub const fn with_minor_loop_bytes(mut self, bytes: u32) -> Self {
        self.minor_loop_bytes = bytes;
        self
    }

    /// Set the major loop iteration count
    #[must_use]
    pub const fn with_iterations(mut self, count: u16) -> Self {
        self.iteration_count = count;
        self
    }

    /// Set the end-of-major-loop address adjustments
    #[must_use]
    pub const fn with_last_adjustments(mut self, source: i32, destination: i32) -> Self {
        self.source_last_adjustment = source;
        self.destination_last_adjustment = destination;
        self
    }

    /// Set the completion interrupt enables
    #[must_use]
    pub const fn with_interrupts(mut self, major: bool, half: bool) -> Self {
        self.interrupt_on_major = major;
        self.interrupt_on_half = half;
        self
    }

    /// Clear the request enable once the major loop completes
    #[must_use]
    pub const fn with_disable_request(mut self, disable: bool) -> Self {
        self.disable_request_on_completion = disable;
        self
    }
}

// =============================================================================
// Descriptor Flags
// =============================================================================

/// Control and status flags parsed from a descriptor's CSR field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TcdFlags {
    /// Software start request pending
    pub start: bool,
    /// Interrupt on major loop completion
    pub interrupt_major: bool,
    /// Interrupt on half major loop completion
    pub interrupt_half: bool,
    /// Clear ERQ on completion
    pub disable_request: bool,
    /// Load the next descriptor on completion
    pub scatter_gather: bool,
    /// Arm `major_link_channel` on completion
    pub major_link: bool,
    /// Channel is executing
    pub active: bool,
    /// Major loop has completed
    pub done: bool,
    /// Channel armed on completion when `major_link` is set
    pub major_link_channel: u8,
    /// Bandwidth control (engine stalls after each read/write)
    pub bandwidth: u8,
}

impl TcdFlags {
    /// Create from a raw CSR value
    #[inline]
    #[must_use]
    pub fn from_raw(raw: u16) -> Self {
        let raw = u32::from(raw);
        Self {
            start: raw & csr::START != 0,
            interrupt_major: raw & csr::INTMAJOR != 0,
            interrupt_half: raw & csr::INTHALF != 0,
            disable_request: raw & csr::DREQ != 0,
            scatter_gather: raw & csr::ESG != 0,
            major_link: raw & csr::MAJORELINK != 0,
            active: raw & csr::ACTIVE != 0,
            done: raw & csr::DONE != 0,
            major_link_channel: csr::MAJORLINKCH.get(raw) as u8,
            bandwidth: csr::BWC.get(raw) as u8,
        }
    }

    /// Convert to a raw CSR value
    #[inline]
    #[must_use]
    pub fn to_raw(&self) -> u16 {
        let mut val = 0u32;
        for (set, bit) in [
            (self.start, csr::START),
            (self.interrupt_major, csr::INTMAJOR),
            (self.interrupt_half, csr::INTHALF),
            (self.disable_request, csr::DREQ),
            (self.scatter_gather, csr::ESG),
            (self.major_link, csr::MAJORELINK),
            (self.active, csr::ACTIVE),
            (self.done, csr::DONE),
        ] {
            if set {
                val |= bit;
            }
        }
        val = csr::MAJORLINKCH.set(val, u32::from(self.major_link_channel));
        val = csr::BWC.set(val, u32::from(self.bandwidth));
        val as u16
    }

    /// Whether either completion interrupt is enabled
    #[inline]
    #[must_use]
    pub fn interrupts_enabled(&self) -> bool {
        self.interrupt_major || self.interrupt_half
    }
}

// =============================================================================
// Encoded Descriptor
// =============================================================================

/// The eight words of one descriptor, with the byte order of the bus that
/// will carry them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TcdWords {
    words: [u32; TCD_WORDS],
    endian: Endian,
}

impl TcdWords {
    /// An all-zero descriptor
    #[must_use]
    pub const fn zeroed(endian: Endian) -> Self {
        Self {
            words: [0; TCD_WORDS],
            endian,
        }
    }

    /// Wrap raw words
    #[must_use]
    pub const fn from_words(words: [u32; TCD_WORDS], endian: Endian) -> Self {
        Self { words, endian }
    }

    /// Raw words in write order
    #[must_use]
    pub const fn words(&self) -> [u32; TCD_WORDS] {
        self.words
    }

    /// Read a descriptor from `addr`
    pub fn read<R: RegisterAccess>(bus: &R, addr: usize, endian: Endian) -> Self {
        Self {
            words: core::array::from_fn(|i| bus.read32(addr + 4 * i)),
            endian,
        }
    }

    /// Write all eight words to `addr`, word 0 first
    pub fn write<R: RegisterAccess>(&self, bus: &R, addr: usize) {
        for (i, w) in self.words.iter().enumerate() {
            bus.write32(addr + 4 * i, *w);
        }
    }

    /// Encode `attrs`.
    ///
    /// `channel_link` enables minor and major loop linking to that channel.
    /// `next` enables scatter-gather to the descriptor at that address; the
    /// caller is responsible for validating it (see [`validate_next`]).
    pub fn encode(
        attrs: &TransferAttributes,
        endian: Endian,
        channel_link: Option<u8>,
        next: Option<TcdAddress>,
    ) -> TcdResult<Self> {
        if attrs.source_modulo > MAX_MODULO || attrs.destination_modulo > MAX_MODULO {
            return Err(TcdError::InvalidModulo);
        }

        let mut tcd = Self::zeroed(endian);
        tcd.set_source_address(attrs.source_address);
        tcd.set_destination_address(attrs.destination_address);
        tcd.set_attributes(
            attrs.source_size,
            attrs.source_modulo,
            attrs.destination_size,
            attrs.destination_modulo,
        );
        tcd.set_source_offset(attrs.source_offset);
        tcd.set_destination_offset(attrs.destination_offset);
        tcd.set_minor_loop_bytes(attrs.minor_loop_bytes);
        tcd.set_source_last_adjustment(attrs.source_last_adjustment);

        let count_field = if channel_link.is_some() {
            iter::COUNT_LINKED
        } else {
            iter::COUNT
        };
        if !count_field.fits(u32::from(attrs.iteration_count)) {
            warn!(
                "iteration count {} truncated to {} bits",
                attrs.iteration_count,
                count_field.width
            );
        }
        let mut iterations = count_field.set(0, u32::from(attrs.iteration_count));
        if let Some(link) = channel_link {
            iterations = iter::ELINK.set(iterations, 1);
            iterations = iter::LINKCH.set(iterations, u32::from(link));
        }
        tcd.set_citer_raw(iterations as u16);
        tcd.set_biter_raw(iterations as u16);

        let mut flags = TcdFlags {
            interrupt_major: attrs.interrupt_on_major,
            interrupt_half: attrs.interrupt_on_half,
            disable_request: attrs.disable_request_on_completion,
            ..TcdFlags::default()
        };
        if let Some(link) = channel_link {
            flags.major_link = true;
            flags.major_link_channel = link;
        }
        match next {
            Some(address) => {
                flags.scatter_gather = true;
                tcd.set_last_destination_or_next(address.raw());
            }
            None => tcd.set_last_destination_or_next(attrs.destination_last_adjustment as u32),
        }
        tcd.set_flags(flags);

        Ok(tcd)
    }

    // -------------------------------------------------------------------------
    // Half-word helpers
    // -------------------------------------------------------------------------

    #[inline(always)]
    fn half(&self, index: usize, field: Field) -> u16 {
        field.get(self.words[index]) as u16
    }

    #[inline(always)]
    fn set_half(&mut self, index: usize, field: Field, value: u16) {
        self.words[index] = field.set(self.words[index], u32::from(value));
    }

    // -------------------------------------------------------------------------
    // Word fields
    // -------------------------------------------------------------------------

    /// Source address
    #[must_use]
    pub const fn source_address(&self) -> u32 {
        self.words[word::SADDR]
    }

    /// Set the source address
    pub fn set_source_address(&mut self, value: u32) {
        self.words[word::SADDR] = value;
    }

    /// Destination address
    #[must_use]
    pub const fn destination_address(&self) -> u32 {
        self.words[word::DADDR]
    }

    /// Set the destination address
    pub fn set_destination_address(&mut self, value: u32) {
        self.words[word::DADDR] = value;
    }

    /// Minor loop byte count
    #[must_use]
    pub const fn minor_loop_bytes(&self) -> u32 {
        self.words[word::NBYTES]
    }

    /// Set the minor loop byte count
    pub fn set_minor_loop_bytes(&mut self, value: u32) {
        self.words[word::NBYTES] = value;
    }

    /// Last source address adjustment
    #[must_use]
    pub const fn source_last_adjustment(&self) -> i32 {
        self.words[word::SLAST] as i32
    }

    /// Set the last source address adjustment
    pub fn set_source_last_adjustment(&mut self, value: i32) {
        self.words[word::SLAST] = value as u32;
    }

    /// Raw DLAST_SGA word: the last destination adjustment, or the next
    /// descriptor address when scatter-gather is enabled
    #[must_use]
    pub const fn last_destination_or_next(&self) -> u32 {
        self.words[word::DLAST_SGA]
    }

    /// Set the raw DLAST_SGA word
    pub fn set_last_destination_or_next(&mut self, value: u32) {
        self.words[word::DLAST_SGA] = value;
    }

    /// Next descriptor address, if scatter-gather is enabled
    #[must_use]
    pub fn next_descriptor(&self) -> Option<TcdAddress> {
        self.flags()
            .scatter_gather
            .then(|| TcdAddress(self.last_destination_or_next()))
    }

    // -------------------------------------------------------------------------
    // Half-word fields
    // -------------------------------------------------------------------------

    /// Signed source offset
    #[must_use]
    pub fn source_offset(&self) -> i16 {
        self.half(word::ATTR_SOFF, self.endian.low_half()) as i16
    }

    /// Set the signed source offset
    pub fn set_source_offset(&mut self, value: i16) {
        self.set_half(word::ATTR_SOFF, self.endian.low_half(), value as u16);
    }

    /// Raw ATTR field
    #[must_use]
    pub fn attributes_raw(&self) -> u16 {
        self.half(word::ATTR_SOFF, self.endian.high_half())
    }

    /// Set sizes and modulo in one ATTR write; modulo values are masked to 5 bits
    pub fn set_attributes(
        &mut self,
        source_size: TransferSize,
        source_modulo: u8,
        destination_size: TransferSize,
        destination_modulo: u8,
    ) {
        let mut raw = attr::SSIZE.set(0, source_size.to_bits());
        raw = attr::SMOD.set(raw, u32::from(source_modulo));
        raw = attr::DSIZE.set(raw, destination_size.to_bits());
        raw = attr::DMOD.set(raw, u32::from(destination_modulo));
        self.set_half(word::ATTR_SOFF, self.endian.high_half(), raw as u16);
    }

    /// Source access size, `None` for a reserved encoding
    #[must_use]
    pub fn source_size(&self) -> Option<TransferSize> {
        TransferSize::from_bits(attr::SSIZE.get(u32::from(self.attributes_raw())))
    }

    /// Destination access size, `None` for a reserved encoding
    #[must_use]
    pub fn destination_size(&self) -> Option<TransferSize> {
        TransferSize::from_bits(attr::DSIZE.get(u32::from(self.attributes_raw())))
    }

    /// Source address modulo
    #[must_use]
    pub fn source_modulo(&self) -> u8 {
        attr::SMOD.get(u32::from(self.attributes_raw())) as u8
    }

    /// Destination address modulo
    #[must_use]
    pub fn destination_modulo(&self) -> u8 {
        attr::DMOD.get(u32::from(self.attributes_raw())) as u8
    }

    /// Signed destination offset
    #[must_use]
    pub fn destination_offset(&self) -> i16 {
        self.half(word::CITER_DOFF, self.endian.low_half()) as i16
    }

    /// Set the signed destination offset
    pub fn set_destination_offset(&mut self, value: i16) {
        self.set_half(word::CITER_DOFF, self.endian.low_half(), value as u16);
    }

    /// Raw CITER field
    #[must_use]
    pub fn citer_raw(&self) -> u16 {
        self.half(word::CITER_DOFF, self.endian.high_half())
    }

    /// Set the raw CITER field
    pub fn set_citer_raw(&mut self, value: u16) {
        self.set_half(word::CITER_DOFF, self.endian.high_half(), value);
    }

    /// Raw BITER field
    #[must_use]
    pub fn biter_raw(&self) -> u16 {
        self.half(word::BITER_CSR, self.endian.high_half())
    }

    /// Set the raw BITER field
    pub fn set_biter_raw(&mut self, value: u16) {
        self.set_half(word::BITER_CSR, self.endian.high_half(), value);
    }

    /// Raw CSR field
    #[must_use]
    pub fn csr_raw(&self) -> u16 {
        self.half(word::BITER_CSR, self.endian.low_half())
    }

    /// Set the raw CSR field
    pub fn set_csr_raw(&mut self, value: u16) {
        self.set_half(word::BITER_CSR, self.endian.low_half(), value);
    }

    /// Decoded CSR flags
    #[must_use]
    pub fn flags(&self) -> TcdFlags {
        TcdFlags::from_raw(self.csr_raw())
    }

    /// Replace the CSR field
    pub fn set_flags(&mut self, flags: TcdFlags) {
        self.set_csr_raw(flags.to_raw());
    }

    // -------------------------------------------------------------------------
    // Iteration counts
    // -------------------------------------------------------------------------

    /// Current (remaining) major iteration count
    #[must_use]
    pub fn current_iterations(&self) -> u16 {
        iteration_count(self.citer_raw())
    }

    /// Beginning major iteration count
    #[must_use]
    pub fn beginning_iterations(&self) -> u16 {
        iteration_count(self.biter_raw())
    }

    /// Channel armed after each minor loop, if minor linking is enabled
    #[must_use]
    pub fn minor_link(&self) -> Option<u8> {
        let raw = u32::from(self.citer_raw());
        (iter::ELINK.get(raw) != 0).then(|| iter::LINKCH.get(raw) as u8)
    }

    /// Channel armed after the major loop, if major linking is enabled
    #[must_use]
    pub fn major_link(&self) -> Option<u8> {
        let flags = self.flags();
        flags.major_link.then_some(flags.major_link_channel)
    }
}

/// Decode the count of a CITER/BITER value, honouring its ELINK bit
#[must_use]
pub fn iteration_count(raw: u16) -> u16 {
    let raw = u32::from(raw);
    let field = if iter::ELINK.get(raw) != 0 {
        iter::COUNT_LINKED
    } else {
        iter::COUNT
    };
    field.get(raw) as u16
}
