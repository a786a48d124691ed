//! Memory-mapped register access for the eDMA and DMAMUX blocks
//!
//! Every register access in the driver goes through [`RegisterAccess`]. On
//! hardware this is [`Mmio`], which performs volatile loads and stores. Host
//! tests substitute a simulated bus.
//!
//! Bitfields are described once with [`Field`], and byte-lane ordering is
//! described once with [`Endian`]; no call site shifts or masks by hand.

pub mod dmamux;
pub mod edma;
pub mod protect;

/// Read a 32-bit register at the given address
///
/// # Safety
/// The caller must ensure the address is valid and properly aligned.
#[inline(always)]
pub unsafe fn read_reg(addr: usize) -> u32 {
    unsafe { core::ptr::read_volatile(addr as *const u32) }
}

/// Write a 32-bit value to a register at the given address
///
/// # Safety
/// The caller must ensure the address is valid and properly aligned.
#[inline(always)]
pub unsafe fn write_reg(addr: usize, value: u32) {
    unsafe { core::ptr::write_volatile(addr as *mut u32, value) }
}

/// Read an 8-bit register at the given address
///
/// # Safety
/// The caller must ensure the address is valid.
#[inline(always)]
pub unsafe fn read_reg8(addr: usize) -> u8 {
    unsafe { core::ptr::read_volatile(addr as *const u8) }
}

/// Write an 8-bit value to a register at the given address
///
/// # Safety
/// The caller must ensure the address is valid.
#[inline(always)]
pub unsafe fn write_reg8(addr: usize, value: u8) {
    unsafe { core::ptr::write_volatile(addr as *mut u8, value) }
}

// =============================================================================
// Bus Abstraction
// =============================================================================

/// Register bus used by every controller and multiplexer instance.
///
/// Implementations perform plain loads and stores. Side effects of
/// write-to-act registers belong to the hardware (or its simulation), not to
/// the implementation.
pub trait RegisterAccess {
    /// Read a 32-bit register
    fn read32(&self, addr: usize) -> u32;

    /// Write a 32-bit register
    fn write32(&self, addr: usize, value: u32);

    /// Read an 8-bit register
    fn read8(&self, addr: usize) -> u8;

    /// Write an 8-bit register
    fn write8(&self, addr: usize, value: u8);

    /// Modify a 32-bit register using a read-modify-write operation
    #[inline]
    fn modify32<F>(&self, addr: usize, f: F)
    where
        F: FnOnce(u32) -> u32,
    {
        let value = self.read32(addr);
        self.write32(addr, f(value));
    }

    /// Replace the bits selected by `mask` with the matching bits of `value`
    #[inline]
    fn read_modify_write(&self, addr: usize, mask: u32, value: u32) {
        self.modify32(addr, |v| (v & !mask) | (value & mask));
    }

    /// Set bits in a register (read-modify-write)
    #[inline]
    fn set_bits(&self, addr: usize, bits: u32) {
        self.modify32(addr, |v| v | bits);
    }

    /// Clear bits in a register (read-modify-write)
    #[inline]
    fn clear_bits(&self, addr: usize, bits: u32) {
        self.modify32(addr, |v| v & !bits);
    }

    /// Return the bits of a register selected by `mask`
    #[inline]
    fn get_bits(&self, addr: usize, mask: u32) -> u32 {
        self.read32(addr) & mask
    }

    /// Read a bitfield of a 32-bit register
    #[inline]
    fn read_field(&self, addr: usize, field: Field) -> u32 {
        field.get(self.read32(addr))
    }

    /// Write a bitfield of a 32-bit register, leaving other bits untouched
    #[inline]
    fn write_field(&self, addr: usize, field: Field, value: u32) {
        self.modify32(addr, |v| field.set(v, value));
    }
}

impl<T: RegisterAccess> RegisterAccess for &T {
    #[inline(always)]
    fn read32(&self, addr: usize) -> u32 {
        (**self).read32(addr)
    }

    #[inline(always)]
    fn write32(&self, addr: usize, value: u32) {
        (**self).write32(addr, value);
    }

    #[inline(always)]
    fn read8(&self, addr: usize) -> u8 {
        (**self).read8(addr)
    }

    #[inline(always)]
    fn write8(&self, addr: usize, value: u8) {
        (**self).write8(addr, value);
    }
}

/// Volatile memory-mapped bus.
#[derive(Debug, Clone, Copy)]
pub struct Mmio {
    _private: (),
}

impl Mmio {
    /// Create the memory-mapped bus.
    ///
    /// # Safety
    ///
    /// Every base address later handed to the driver must point at the
    /// matching peripheral (or, for scatter-gather descriptors, at RAM the
    /// driver may write) on the running target.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl RegisterAccess for Mmio {
    #[inline(always)]
    fn read32(&self, addr: usize) -> u32 {
        // SAFETY: address validity is the contract of `Mmio::new`
        unsafe { read_reg(addr) }
    }

    #[inline(always)]
    fn write32(&self, addr: usize, value: u32) {
        // SAFETY: address validity is the contract of `Mmio::new`
        unsafe { write_reg(addr, value) }
    }

    #[inline(always)]
    fn read8(&self, addr: usize) -> u8 {
        // SAFETY: address validity is the contract of `Mmio::new`
        unsafe { read_reg8(addr) }
    }

    #[inline(always)]
    fn write8(&self, addr: usize, value: u8) {
        // SAFETY: address validity is the contract of `Mmio::new`
        unsafe { write_reg8(addr, value) }
    }
}

// =============================================================================
// Bitfields and Byte Lanes
// =============================================================================

/// A contiguous bitfield within a 32-bit word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Field {
    /// Position of the least significant bit
    pub shift: u32,
    /// Number of bits
    pub width: u32,
}

impl Field {
    /// Describe a field of `width` bits starting at bit `shift`
    #[must_use]
    pub const fn new(shift: u32, width: u32) -> Self {
        Self { shift, width }
    }

    /// Single-bit field
    #[must_use]
    pub const fn bit(shift: u32) -> Self {
        Self::new(shift, 1)
    }

    /// Largest value the field can hold
    #[must_use]
    pub const fn max(self) -> u32 {
        if self.width >= 32 {
            u32::MAX
        } else {
            (1 << self.width) - 1
        }
    }

    /// Mask of the field in place
    #[must_use]
    pub const fn mask(self) -> u32 {
        self.max() << self.shift
    }

    /// Extract the field from a word
    #[must_use]
    pub const fn get(self, word: u32) -> u32 {
        (word >> self.shift) & self.max()
    }

    /// Return `word` with the field replaced by `value`; excess bits of `value` are dropped
    #[must_use]
    pub const fn set(self, word: u32, value: u32) -> u32 {
        (word & !self.mask()) | ((value & self.max()) << self.shift)
    }

    /// Whether `value` fits in the field without truncation
    #[must_use]
    pub const fn fits(self, value: u32) -> bool {
        value <= self.max()
    }
}

/// Byte-lane order of the controller's bus interface.
///
/// Byte-array registers (channel priorities, master IDs) are documented as
/// packed 32-bit words. On a little-endian bus the byte for channel `n`
/// therefore sits at `n ^ 3`; on a big-endian bus it sits at `n`. The same
/// choice decides which half of a TCD word holds the lower-addressed 16-bit
/// field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Endian {
    /// Lower address holds the least significant byte
    #[default]
    Little,
    /// Lower address holds the most significant byte
    Big,
}

impl Endian {
    /// Byte offset of element `index` in a byte array packed into 32-bit words
    #[must_use]
    pub const fn byte_lane(self, index: usize) -> usize {
        match self {
            Endian::Little => index ^ 3,
            Endian::Big => index,
        }
    }

    /// 16-bit field stored at the lower address of a 32-bit word
    #[must_use]
    pub const fn low_half(self) -> Field {
        match self {
            Endian::Little => Field::new(0, 16),
            Endian::Big => Field::new(16, 16),
        }
    }

    /// 16-bit field stored at the higher address of a 32-bit word
    #[must_use]
    pub const fn high_half(self) -> Field {
        match self {
            Endian::Little => Field::new(16, 16),
            Endian::Big => Field::new(0, 16),
        }
    }
}

// =============================================================================
// Register Access Macros
// =============================================================================

/// Generate read/write accessor methods for a base-relative register.
///
/// # Example
/// ```ignore
/// impl<R: RegisterAccess> EdmaRegs<R> {
///     reg_rw!(control, set_control, CR_OFFSET, "Control register");
/// }
/// ```
macro_rules! reg_rw {
    ($read_fn:ident, $write_fn:ident, $offset:expr, $doc:expr) => {
        #[doc = concat!("Read ", $doc)]
        #[inline(always)]
        pub fn $read_fn(&self) -> u32 {
            self.bus.read32(self.base + $offset)
        }

        #[doc = concat!("Write ", $doc)]
        #[inline(always)]
        pub fn $write_fn(&self, value: u32) {
            self.bus.write32(self.base + $offset, value)
        }
    };
}

/// Generate a read-only accessor method for a base-relative register.
macro_rules! reg_ro {
    ($read_fn:ident, $offset:expr, $doc:expr) => {
        #[doc = concat!("Read ", $doc)]
        #[inline(always)]
        pub fn $read_fn(&self) -> u32 {
            self.bus.read32(self.base + $offset)
        }
    };
}

/// Generate a write-only accessor for a channel-indexed byte command register.
///
/// # Example
/// ```ignore
/// impl<R: RegisterAccess> EdmaRegs<R> {
///     reg_cmd8!(set_enable_request, SERQ_OFFSET, "Set Enable Request");
/// }
/// ```
macro_rules! reg_cmd8 {
    ($write_fn:ident, $offset:expr, $doc:expr) => {
        #[doc = concat!("Write ", $doc, " with a channel number or command flags")]
        #[inline(always)]
        pub fn $write_fn(&self, value: u8) {
            self.bus.write8(self.base + $offset, value)
        }
    };
}

// Export macros for use in submodules
pub(crate) use reg_cmd8;
pub(crate) use reg_ro;
pub(crate) use reg_rw;
