//! Opt-in diagnostics for tests and examples.

use tracing_subscriber::EnvFilter;

/// Install a `tracing` subscriber driven by `RUST_LOG`.
///
/// Does nothing when the variable is absent, and is harmless to call
/// more than once or alongside an already-installed global subscriber.
pub fn init_tracing() {
    let Ok(filter) = EnvFilter::try_from_default_env() else {
        return;
    };

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
