//! Scatter-gather chain checks.
//!
//! Before a descriptor is pointed at a next descriptor, the chain reachable
//! from that next descriptor is followed through memory. The link is refused
//! if the chain returns to the descriptor being written, or if it does not
//! end within [`MAX_SCATTER_GATHER_CHAIN`] hops.

use super::{TcdAddress, TcdWords};
use crate::constants::MAX_SCATTER_GATHER_CHAIN;
use crate::error::{TcdError, TcdResult};
use crate::register::{Endian, RegisterAccess};

/// Check that `current` may link to `next` under scatter-gather.
///
/// # Errors
///
/// - [`TcdError::NullDescriptor`] if `next` is null
/// - [`TcdError::MisalignedDescriptor`] if `next` is not 32-byte aligned
/// - [`TcdError::ScatterGatherCycle`] if `next` is `current`, the chain from
///   `next` leads back to `current`, or the chain does not terminate
pub fn validate_next<R: RegisterAccess>(
    bus: &R,
    endian: Endian,
    current: usize,
    next: TcdAddress,
) -> TcdResult<()> {
    if next.is_null() {
        return Err(TcdError::NullDescriptor);
    }
    if !next.is_aligned() {
        return Err(TcdError::MisalignedDescriptor);
    }

    let mut cursor = next;
    for _ in 0..MAX_SCATTER_GATHER_CHAIN {
        if cursor.as_usize() == current {
            warn!("scatter-gather link to {} closes a cycle", next.raw());
            return Err(TcdError::ScatterGatherCycle);
        }
        match TcdWords::read(bus, cursor.as_usize(), endian).next_descriptor() {
            Some(following) if !following.is_null() => cursor = following,
            _ => return Ok(()),
        }
    }

    warn!("scatter-gather chain from {} does not terminate", next.raw());
    Err(TcdError::ScatterGatherCycle)
}

/// Number of descriptors reachable from `start`, including `start`, or `None`
/// if the chain does not terminate within [`MAX_SCATTER_GATHER_CHAIN`] hops.
#[must_use]
pub fn chain_length<R: RegisterAccess>(
    bus: &R,
    endian: Endian,
    start: TcdAddress,
) -> Option<usize> {
    let mut cursor = start;
    for length in 1..=MAX_SCATTER_GATHER_CHAIN {
        match TcdWords::read(bus, cursor.as_usize(), endian).next_descriptor() {
            Some(following) if !following.is_null() => cursor = following,
            _ => return Some(length),
        }
    }
    None
}
