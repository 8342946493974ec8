//! Error types carried through session callbacks.
//!
//! Errors are surfaced as values in `on_error`/`on_close`, never as
//! panics. Success is `Ok`/`None`, not a variant.

use std::io;

use thiserror::Error;

/// Error type for transport, protocol and usage failures.
#[derive(Debug, Error)]
pub enum NetError {
    /// Transport failure (resolve, connect, read or write).
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// A write was posted while the session was not connected.
    #[error("not_connected")]
    NotConnected,

    /// An operation was cancelled by a controller stop.
    #[error("operation aborted")]
    Aborted,

    /// A length prefix was negative or exceeded the configured cap.
    #[error("invalid frame length {length}")]
    InvalidFrame {
        /// The offending length prefix, widened for reporting.
        length: i64,
    },
}

/// Result type alias for fallible operations inside the framework.
pub type Result<T> = std::result::Result<T, NetError>;

impl NetError {
    /// Create a protocol error for a bad length prefix.
    #[must_use]
    pub const fn invalid_frame(length: i64) -> Self {
        Self::InvalidFrame { length }
    }

    /// True when the error stems from a controller stop; teardown skips
    /// the graceful socket shutdown for these.
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// True for errors that terminate the session.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::NotConnected)
    }
}
