//! eDMA and DMAMUX driver components.
//!
//! - [`engine`] - Instance arena and logic channel front end
//! - [`controller`] - One eDMA controller: channel manager and descriptor configuration
//! - [`dmamux`] - Request source multiplexer
//! - [`interrupt`] - Completion and error interrupt dispatch
//! - [`classify`] - Error status decoding and classification
//! - [`channel`] - Per-channel settings and state
//! - [`config`] - Static configuration tables
//!
//! # Example
//!
//! ```ignore
//! use ph_edma::driver::{DmaEngine, LogicChannel};
//!
//! engine.configure_linked_tcd(LogicChannel(2), &attrs, LogicChannel(5))?;
//! engine.start(LogicChannel(2))?;
//! ```

pub mod channel;
pub mod classify;
pub mod config;
pub mod controller;
pub mod dmamux;
pub mod engine;
pub mod interrupt;

pub use channel::{ChannelState, ChannelStatus, MasterId, Preemption};
pub use classify::{BusSide, ErrorKind, ErrorStatus, PriorityScope};
pub use config::{
    ChannelConfig, ChannelNotification, ChannelTrigger, ControllerConfig, DmaConfig, DmaMuxConfig,
    ErrorNotification, IrqRouting, MuxBindingConfig,
};
pub use controller::DmaController;
pub use dmamux::{DmaMux, MuxBinding};
pub use engine::{DmaEngine, DmaInstance, LogicChannel, MuxInstance};
pub use interrupt::{ChannelEvent, CombinedGroup, ErrorEvent, PendingChannels, TransferEvent};
