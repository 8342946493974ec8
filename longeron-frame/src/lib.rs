//! Longeron Frame
//!
//! The wire protocol and session machinery of the framework:
//! - Length-prefix message codec (`codec`)
//! - Outbound message builder (`write_buffer`)
//! - Double-buffered outbound queue (`write_queue`)
//! - Per-connection session actor (`session`)
//! - Session registry (`registry`)
//!
//! This crate is internal; embedders use the `longeron` crate.

#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod codec;
pub mod registry;
pub mod session;
pub mod write_buffer;
pub mod write_queue;

pub mod prelude {
    pub use crate::codec::{encode_frame, FrameDecoder};
    pub use crate::registry::SessionRegistry;
    pub use crate::session::{Collaborators, Session};
    pub use crate::write_buffer::WriteBuffer;
    pub use crate::write_queue::{BufferKind, WriteQueue};
}
