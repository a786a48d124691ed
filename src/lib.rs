//! eDMA / DMAMUX Driver
//!
//! A `no_std`, `no_alloc` driver for the enhanced DMA (eDMA) controller and
//! its DMA request multiplexer (DMAMUX), as found on many Cortex-M and
//! Power Architecture microcontrollers.
//!
//! # Architecture
//!
//! 1. **Register layer** ([`register`]): the [`RegisterAccess`] bus trait,
//!    [`Field`] bitfields, [`Endian`] byte lanes and the soft lock sequence
//! 2. **Descriptor layer** ([`tcd`]): transfer attributes, TCD word encoding
//!    and scatter-gather chain validation
//! 3. **Driver layer** ([`driver`]): controllers, multiplexers, interrupt
//!    dispatch and error classification behind one [`DmaEngine`]
//! 4. **Sharing** ([`sync`]): critical-section protected access from
//!    interrupt handlers
//!
//! Up to two controllers of 16, 32 or 64 channels and four multiplexers are
//! supported. Clients address channels through absolute [`LogicChannel`]
//! ids assigned by a static configuration table.
//!
//! # Features
//!
//! - `defmt`: log through `defmt` and derive `defmt::Format` for public types
//! - `log`: log through the `log` facade
//!
//! # Example
//!
//! ```ignore
//! use ph_edma::{DmaConfig, DmaEngine, LogicChannel, Mmio, TransferAttributes};
//!
//! static DMA: SharedEngine<Mmio> = SharedEngine::new();
//!
//! DMA.with(|engine| {
//!     engine.init(unsafe { Mmio::new() }, &DmaConfig::new(&CONTROLLERS, &CHANNELS, &MUXES, &BINDINGS))?;
//!     let attrs = TransferAttributes::new(src, dst)
//!         .with_sizes(TransferSize::Bits32, TransferSize::Bits32)
//!         .with_offsets(4, 4)
//!         .with_minor_loop_bytes(16)
//!         .with_iterations(8)
//!         .with_interrupts(true, false);
//!     engine.configure_tcd(LogicChannel(0), &attrs)?;
//!     engine.start(LogicChannel(0))
//! })?;
//! ```

#![no_std]
#![deny(missing_docs)]
#![allow(unsafe_code)]
#![deny(unsafe_op_in_unsafe_fn)]
// Clippy lint levels
#![deny(clippy::correctness)]
#![warn(
    clippy::suspicious,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::cloned_instead_of_copied,
    clippy::explicit_iter_loop,
    clippy::implicit_clone,
    clippy::inconsistent_struct_constructor,
    clippy::manual_assert,
    clippy::manual_let_else,
    clippy::match_same_arms,
    clippy::needless_pass_by_value,
    clippy::semicolon_if_nothing_returned,
    clippy::uninlined_format_args,
    clippy::unnested_or_patterns,
    clippy::std_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::alloc_instead_of_core
)]
#![allow(
    clippy::mod_module_files,
    clippy::self_named_module_files,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::struct_excessive_bools,
    clippy::fn_params_excessive_bools,
    clippy::type_complexity,
    clippy::must_use_candidate,
    clippy::assertions_on_constants,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_lossless,
    clippy::panic_in_result_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::module_name_repetitions,
    clippy::wildcard_imports,
    clippy::items_after_statements,
    clippy::let_underscore_future
)]

// =============================================================================
// Modules
// =============================================================================

// Must come first so the logging macros are visible to every other module
mod fmt;

pub mod constants;
pub mod driver;
pub mod error;
pub mod register;
pub mod sync;
pub mod tcd;

// Test utilities (only available during testing)
#[cfg(test)]
pub mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use driver::{
    BusSide, ChannelConfig, ChannelEvent, ChannelNotification, ChannelState, ChannelStatus,
    ChannelTrigger, CombinedGroup, ControllerConfig, DmaConfig, DmaController, DmaEngine,
    DmaInstance, DmaMux, DmaMuxConfig, ErrorEvent, ErrorKind, ErrorNotification, ErrorStatus,
    IrqRouting, LogicChannel, MasterId, MuxBinding, MuxBindingConfig, MuxInstance, Preemption,
    PriorityScope, TransferEvent,
};
pub use error::{ChannelError, ConfigError, ConfigResult, Error, Result, TcdError, TcdResult};
pub use register::protect::Protection;
pub use register::{Endian, Field, Mmio, RegisterAccess};
pub use sync::{CriticalSectionCell, SharedEngine};
pub use tcd::{TcdAddress, TcdStorage, TcdWords, TransferAttributes, TransferSize};
