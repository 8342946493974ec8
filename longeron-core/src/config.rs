//! Connection configuration supplied by the embedder.

/// Address and socket options for a controller.
///
/// Each option returns `Option`: `None` means "leave the system default
/// untouched". Every non-absent option is applied before the socket is
/// used — stream options right after connect/accept, listener options
/// before the accept loop starts.
pub trait Configuration: Send + Sync {
    /// Host and port to dial (client) or bind (server). The host may be a
    /// domain name; resolution happens asynchronously on a worker.
    fn address(&self) -> (String, u16);

    /// `SO_REUSEADDR` on the listener.
    fn reuse_address(&self) -> Option<bool> {
        None
    }

    /// Advisory cap on a single message's payload length. Length prefixes
    /// above the cap are treated as fatal protocol errors on the
    /// connection. Defaults to `i32::MAX`.
    fn max_message_size(&self) -> Option<usize> {
        None
    }

    /// `SO_LINGER`: `(enabled, seconds)`.
    fn linger(&self) -> Option<(bool, u32)> {
        None
    }

    /// `TCP_NODELAY`: `true` disables Nagle's algorithm.
    fn no_delay(&self) -> Option<bool> {
        None
    }

    /// `SO_KEEPALIVE`.
    fn keepalive(&self) -> Option<bool> {
        None
    }
}

/// Immutable snapshot of a [`Configuration`]'s socket options, captured
/// when a connect or accept starts so later reconfiguration cannot race
/// live sessions.
#[derive(Debug, Clone, Default)]
pub struct SocketConfig {
    pub reuse_address: Option<bool>,
    pub max_message_size: Option<usize>,
    pub linger: Option<(bool, u32)>,
    pub no_delay: Option<bool>,
    pub keepalive: Option<bool>,
}

impl SocketConfig {
    /// Capture the option set of `configuration`.
    #[must_use]
    pub fn capture(configuration: &dyn Configuration) -> Self {
        Self {
            reuse_address: configuration.reuse_address(),
            max_message_size: configuration.max_message_size(),
            linger: configuration.linger(),
            no_delay: configuration.no_delay(),
            keepalive: configuration.keepalive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Defaults;

    impl Configuration for Defaults {
        fn address(&self) -> (String, u16) {
            ("127.0.0.1".to_string(), 20195)
        }
    }

    #[test]
    fn absent_options_stay_absent() {
        let snapshot = SocketConfig::capture(&Defaults);
        assert!(snapshot.reuse_address.is_none());
        assert!(snapshot.max_message_size.is_none());
        assert!(snapshot.linger.is_none());
        assert!(snapshot.no_delay.is_none());
        assert!(snapshot.keepalive.is_none());
    }
}
