//! SIGINT/SIGTERM watcher.
//!
//! A controller installs one watcher at construction; the first signal
//! triggers a stop, mirroring a service's usual ctrl-c behaviour.

use std::io;

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use tracing::info;

/// Keeps the watcher thread stoppable. Closing the handle ends the
/// blocking signal iterator, letting the thread exit on its own; the
/// guard never joins it, so a stop initiated *from* the signal thread
/// cannot deadlock.
pub(crate) struct SignalGuard {
    handle: Handle,
}

impl SignalGuard {
    pub(crate) fn close(&self) {
        self.handle.close();
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.close();
    }
}

/// Spawn the watcher thread; `on_signal` runs once, on the first
/// SIGINT or SIGTERM.
pub(crate) fn watch<F>(on_signal: F) -> io::Result<SignalGuard>
where
    F: Fn() + Send + 'static,
{
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let handle = signals.handle();

    std::thread::Builder::new()
        .name("longeron-signal".to_string())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                info!(signal, "stopping on signal");
                on_signal();
            }
        })?;

    Ok(SignalGuard { handle })
}
