//! Longeron Core
//!
//! This crate contains the transport-agnostic building blocks of the
//! framework:
//! - Ring buffer for inbound byte reassembly (`buffer`)
//! - Reserved-slot scratch storage for completion reads (`arena`)
//! - Collaborator contracts: service, logging, monitor, configuration
//! - Socket option plumbing (`tcp`)
//! - Error types (`error`)

#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod arena;
pub mod buffer;
pub mod config;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod service;
pub mod tcp;

// A small prelude for downstream crates. Kept minimal to avoid API
// lock-in.
pub mod prelude {
    pub use crate::arena::{ReadArena, ScratchMut};
    pub use crate::buffer::StreamBuffer;
    pub use crate::config::{Configuration, SocketConfig};
    pub use crate::error::NetError;
    pub use crate::logging::{LogLevel, Logging};
    pub use crate::monitor::Monitor;
    pub use crate::service::{Service, SessionState, Sid, StateCell};
}
