//! lansweep core - LAN discovery and relay library.
//!
//! This crate holds the pieces shared by every lansweep process: the device
//! registry (sqlite or in-memory), the concurrent subnet sweeper, the
//! presence tracker for connected viewers, the cross-process event relay,
//! and the chat router. The server binary wires these together; one-shot
//! worker processes reuse the same registry and relay.

pub mod chat;
pub mod error;
pub mod net;
pub mod presence;
pub mod probe;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod sweep;
pub mod types;

pub use error::{CoreError, Result};
