//! Centralized Constants
//!
//! This module provides a single source of truth for the sizing limits and
//! layout constants used throughout the eDMA driver.
//!
//! # Organization
//!
//! Constants are grouped by category:
//! - **Instance limits**: how many controllers and multiplexers exist
//! - **Channel limits**: channel counts and per-channel field widths
//! - **Descriptor layout**: TCD sizing and scatter-gather limits
//!
//! # Note
//!
//! Hardware register offsets and bit definitions remain in their respective
//! modules (`register/edma.rs`, `register/dmamux.rs`, `tcd/bits.rs`) as they
//! are specific to those hardware blocks.

// =============================================================================
// Instance Limits
// =============================================================================

/// Maximum number of eDMA controller instances
pub const MAX_DMA_INSTANCES: usize = 2;

/// Maximum number of DMAMUX instances
pub const MAX_DMAMUX_INSTANCES: usize = 4;

// =============================================================================
// Channel Limits
// =============================================================================

/// Maximum number of hardware channels on one controller
pub const MAX_CHANNELS_PER_CONTROLLER: usize = 64;

/// Maximum number of logic channels across all controllers
pub const MAX_LOGIC_CHANNELS: usize = MAX_DMA_INSTANCES * MAX_CHANNELS_PER_CONTROLLER;

/// Maximum number of channels served by one DMAMUX instance
pub const MAX_MUX_CHANNELS: usize = 64;

/// Supported controller widths
pub const SUPPORTED_CHANNEL_COUNTS: [usize; 3] = [16, 32, 64];

/// Number of channels in one arbitration group
pub const CHANNELS_PER_GROUP: usize = 16;

/// Highest channel priority within a group (4-bit CHPRI field)
pub const MAX_CHANNEL_PRIORITY: u8 = 15;

/// Highest group priority (2-bit GRPnPRI field)
pub const MAX_GROUP_PRIORITY: u8 = 3;

/// Highest master ID that can be replicated (4-bit MID field)
pub const MAX_MASTER_ID: u8 = 15;

/// Highest DMAMUX request source (6-bit SOURCE field)
pub const MAX_MUX_SOURCE: u8 = 63;

// =============================================================================
// Descriptor Layout
// =============================================================================

/// Size of one transfer control descriptor in bytes
pub const TCD_SIZE: usize = 32;

/// Number of 32-bit words in one transfer control descriptor
pub const TCD_WORDS: usize = 8;

/// Required alignment of scatter-gather descriptors in bytes
pub const TCD_ALIGNMENT: u32 = 32;

/// Longest scatter-gather chain followed when checking for cycles
pub const MAX_SCATTER_GATHER_CHAIN: usize = 256;

/// Widest major-loop iteration count without channel linking (15 bits)
pub const MAX_ITERATIONS_UNLINKED: u16 = 0x7FFF;

/// Widest major-loop iteration count with channel linking (9 bits)
pub const MAX_ITERATIONS_LINKED: u16 = 0x01FF;

// =============================================================================
// Timing
// =============================================================================

/// Interval between DONE polls while waiting for a transfer (microseconds)
pub const COMPLETION_POLL_US: u32 = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logic_channels_cover_all_controllers() {
        assert_eq!(MAX_LOGIC_CHANNELS, 128);
    }

    #[test]
    fn tcd_words_match_size() {
        assert_eq!(TCD_WORDS * 4, TCD_SIZE);
        assert_eq!(TCD_ALIGNMENT as usize, TCD_SIZE);
    }

    #[test]
    fn groups_divide_widest_controller() {
        assert_eq!(MAX_CHANNELS_PER_CONTROLLER % CHANNELS_PER_GROUP, 0);
        assert_eq!(MAX_CHANNELS_PER_CONTROLLER / CHANNELS_PER_GROUP, 4);
    }
}
