//! Session identifiers, connection states and the service callback
//! contract supplied by the embedder.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::NetError;

/// Session identifier: a strictly positive integer assigned by the
/// registry, never reused for the life of the process. `0` is the "none"
/// sentinel returned by a failed connect.
pub type Sid = u64;

/// Connection state of a session.
///
/// Linear progression; `Closed` is terminal. Servers skip `Connecting`
/// (an accepted socket goes straight to `Connected`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    None = 0,
    Connecting = 1,
    Connected = 2,
    Closed = 3,
}

/// Atomic cell holding a [`SessionState`].
///
/// Writes happen on the session task; reads may come from any thread
/// (embedders poll `Connected` after a connect), so accesses are relaxed
/// atomic loads and stores.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl Default for StateCell {
    fn default() -> Self {
        Self::new(SessionState::None)
    }
}

impl StateCell {
    #[must_use]
    pub const fn new(state: SessionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    #[inline]
    pub fn store(&self, state: SessionState) {
        self.0.store(state as u8, Ordering::Relaxed);
    }

    #[inline]
    #[must_use]
    pub fn load(&self) -> SessionState {
        match self.0.load(Ordering::Relaxed) {
            0 => SessionState::None,
            1 => SessionState::Connecting,
            2 => SessionState::Connected,
            _ => SessionState::Closed,
        }
    }

    #[inline]
    #[must_use]
    pub fn is(&self, state: SessionState) -> bool {
        self.load() == state
    }
}

/// Callbacks a service object receives from the framework.
///
/// Implementations must be thread-safe: callbacks are dispatched from the
/// I/O worker threads, one at a time per session but concurrently across
/// sessions.
pub trait Service: Send + Sync {
    /// Invoked once, after a successful connect or accept.
    fn on_connected(&self, sid: Sid);

    /// Invoked once per framed message, in wire order.
    fn on_message(&self, sid: Sid, data: &[u8]);

    /// Invoked at most once per session, on the first terminal error, or
    /// synchronously when a write is posted before the session connects.
    fn on_error(&self, sid: Sid, error: &NetError);

    /// Invoked exactly once, immediately before the session is destroyed.
    /// `None` means the peer or the embedder closed the session cleanly.
    fn on_close(&self, sid: Sid, error: Option<&NetError>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_cell_round_trips_all_states() {
        let cell = StateCell::default();
        assert!(cell.is(SessionState::None));
        for state in [
            SessionState::Connecting,
            SessionState::Connected,
            SessionState::Closed,
        ] {
            cell.store(state);
            assert_eq!(cell.load(), state);
        }
    }
}
