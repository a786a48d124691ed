//! RAM-resident transfer control descriptors for scatter-gather tables.
//!
//! The controller loads the next descriptor of a scatter-gather chain from
//! RAM by bus address. [`TcdStorage`] provides a correctly aligned slot for
//! such a descriptor; it is filled through the register bus like any
//! channel slot, so the same encoder serves both.

use core::cell::UnsafeCell;

use crate::constants::{TCD_ALIGNMENT, TCD_WORDS};

/// Bus address of a transfer control descriptor.
///
/// The controller stores the next-descriptor pointer in a 32-bit word, so a
/// descriptor is always addressed with 32 bits regardless of the host width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TcdAddress(pub u32);

impl TcdAddress {
    /// Wrap a raw bus address
    #[must_use]
    pub const fn new(address: u32) -> Self {
        Self(address)
    }

    /// Convert a host address, if it fits the 32-bit descriptor pointer
    #[must_use]
    pub fn from_usize(address: usize) -> Option<Self> {
        u32::try_from(address).ok().map(Self)
    }

    /// Raw bus address
    #[inline(always)]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Address usable with [`RegisterAccess`](crate::register::RegisterAccess)
    #[inline(always)]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Whether the address is null
    #[inline(always)]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Whether the address satisfies the controller's 32-byte alignment
    #[inline(always)]
    #[must_use]
    pub const fn is_aligned(self) -> bool {
        self.0 % TCD_ALIGNMENT == 0
    }
}

/// Volatile cell wrapper for descriptor words
#[repr(transparent)]
struct VolatileCell<T: Copy> {
    value: UnsafeCell<T>,
}

// Safety: every access is a single volatile load or store of a u32
unsafe impl<T: Copy> Sync for VolatileCell<T> {}

impl<T: Copy> VolatileCell<T> {
    const fn new(value: T) -> Self {
        Self {
            value: UnsafeCell::new(value),
        }
    }

    #[inline(always)]
    fn get(&self) -> T {
        unsafe { core::ptr::read_volatile(self.value.get()) }
    }
}

/// One 32-byte aligned descriptor slot in RAM.
///
/// Place these in a `static` (or any memory the controller can reach) and
/// hand their [`address`](Self::address) to
/// [`DmaController::configure_descriptor`](crate::driver::controller::DmaController::configure_descriptor)
/// or as the next descriptor of a scatter-gather configuration.
#[repr(C, align(32))]
pub struct TcdStorage {
    words: [VolatileCell<u32>; TCD_WORDS],
}

impl TcdStorage {
    /// Create a zeroed descriptor slot
    #[must_use]
    pub const fn new() -> Self {
        Self {
            words: [const { VolatileCell::new(0) }; TCD_WORDS],
        }
    }

    /// Host address of the slot
    #[inline(always)]
    #[must_use]
    pub fn as_usize(&self) -> usize {
        core::ptr::from_ref(self) as usize
    }

    /// Bus address of the slot, or `None` on hosts whose RAM lies above 4 GiB
    #[must_use]
    pub fn address(&self) -> Option<TcdAddress> {
        TcdAddress::from_usize(self.as_usize())
    }

    /// Snapshot of the raw descriptor words
    #[must_use]
    pub fn words(&self) -> [u32; TCD_WORDS] {
        core::array::from_fn(|i| self.words[i].get())
    }
}

impl Default for TcdStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for TcdStorage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TcdStorage")
            .field("words", &self.words())
            .finish()
    }
}
