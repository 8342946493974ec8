//! # Longeron
//!
//! A length-prefixed TCP messaging framework hosting both a listener and
//! a dialer over a shared completion-I/O core. User code plugs in a
//! [`Service`] callback object and a [`Configuration`] provider; the core
//! manages socket lifecycles, frames application messages, serialises
//! outbound writes per connection, and surfaces
//! connect/message/error/close events.
//!
//! ## Architecture
//!
//! - **`longeron-core`**: ring buffer, scratch arena, collaborator
//!   contracts, socket-option plumbing
//! - **`longeron-frame`**: wire codec, write queue, session actor,
//!   session registry
//! - **`longeron`**: the [`Controller`] facade (this crate)
//!
//! ## Wire format
//!
//! Back-to-back messages, each `[len: i32 little-endian][payload]`.
//! A zero length is legal and delivers an empty message.
//!
//! ## Quick start
//!
//! ### Server
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use longeron::{Configuration, Controller, NetError, Service, Sid, WriteBuffer};
//!
//! struct Address;
//! impl Configuration for Address {
//!     fn address(&self) -> (String, u16) {
//!         ("127.0.0.1".to_string(), 20195)
//!     }
//! }
//!
//! struct Echo {
//!     controller: Controller,
//! }
//!
//! impl Service for Echo {
//!     fn on_connected(&self, _sid: Sid) {}
//!     fn on_message(&self, sid: Sid, data: &[u8]) {
//!         let mut reply = WriteBuffer::new();
//!         reply.put(data);
//!         reply.commit();
//!         self.controller.write_buffer(sid, reply);
//!     }
//!     fn on_error(&self, _sid: Sid, _error: &NetError) {}
//!     fn on_close(&self, _sid: Sid, _error: Option<&NetError>) {}
//! }
//!
//! let controller = Controller::new(2);
//! controller.attach_configuration(Arc::new(Address));
//! controller.attach_service(Arc::new(Echo { controller: controller.clone() }));
//! assert!(controller.accept());
//! ```
//!
//! ### Client
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use longeron::{Configuration, Controller, SessionState};
//! # struct Address;
//! # impl Configuration for Address {
//! #     fn address(&self) -> (String, u16) { ("127.0.0.1".to_string(), 20195) }
//! # }
//! let controller = Controller::new(1);
//! controller.attach_configuration(Arc::new(Address));
//! let sid = controller.connect();
//! while !controller.is_state(sid, SessionState::Connected) {
//!     std::thread::sleep(std::time::Duration::from_millis(50));
//! }
//! ```

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

mod controller;
mod signal;

/// Development helpers (tests/examples)
pub mod dev_tracing;

pub use controller::Controller;

// Re-export the embedder-facing contracts and types.
pub use bytes::Bytes;
pub use longeron_core::config::Configuration;
pub use longeron_core::error::NetError;
pub use longeron_core::logging::{LogLevel, Logging};
pub use longeron_core::monitor::Monitor;
pub use longeron_core::service::{Service, SessionState, Sid};
pub use longeron_frame::write_buffer::WriteBuffer;

/// Convenient imports for embedders.
pub mod prelude {
    pub use crate::{
        Bytes, Configuration, Controller, LogLevel, Logging, Monitor, NetError, Service,
        SessionState, Sid, WriteBuffer,
    };
}
