//! ISR-safe access to the DMA engine
//!
//! - [`CriticalSectionCell`]: interior mutability behind a critical section
//! - [`SharedEngine`]: a [`DmaEngine`](crate::driver::engine::DmaEngine) that
//!   thread-mode code configures and interrupt handlers dispatch into
//!
//! # Example
//!
//! ```ignore
//! use ph_edma::sync::SharedEngine;
//!
//! static DMA: SharedEngine<Mmio> = SharedEngine::new();
//!
//! fn main() {
//!     DMA.with(|engine| engine.init(unsafe { Mmio::new() }, &CONFIG)).unwrap();
//! }
//!
//! #[interrupt]
//! fn DMA0_15() {
//!     DMA.on_combined_interrupt(DmaInstance(0), CombinedGroup::Group(0));
//! }
//! ```

mod primitives;
mod shared;

pub use primitives::CriticalSectionCell;
pub use shared::SharedEngine;
