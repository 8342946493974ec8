//! TCP socket option plumbing.
//!
//! compio owns its sockets, so options are applied by borrowing the raw
//! descriptor into a `socket2::Socket` for the duration of one call.
//!
//! # Safety
//!
//! This module uses unsafe code to access raw file descriptors for socket
//! configuration. The unsafe operations are encapsulated and safe to use
//! from the public API.

#![allow(unsafe_code)]

use std::io;
use std::net::Shutdown;
use std::time::Duration;

use crate::config::SocketConfig;

#[cfg(unix)]
fn with_socket<F, R>(fd: std::os::unix::io::RawFd, f: F) -> io::Result<R>
where
    F: FnOnce(&socket2::Socket) -> io::Result<R>,
{
    use std::os::unix::io::FromRawFd;
    let sock = unsafe { socket2::Socket::from_raw_fd(fd) };
    let result = f(&sock);
    std::mem::forget(sock); // borrow only - don't close the fd
    result
}

/// Apply the non-absent stream options from `config` to a connected
/// socket: TCP_NODELAY, SO_KEEPALIVE, SO_LINGER.
pub fn apply_stream_options(
    stream: &compio::net::TcpStream,
    config: &SocketConfig,
) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        with_socket(stream.as_raw_fd(), |sock| {
            if let Some(no_delay) = config.no_delay {
                sock.set_nodelay(no_delay)?;
            }
            if let Some(keepalive) = config.keepalive {
                sock.set_keepalive(keepalive)?;
            }
            if let Some((enabled, seconds)) = config.linger {
                let linger = enabled.then(|| Duration::from_secs(u64::from(seconds)));
                sock.set_linger(linger)?;
            }
            Ok(())
        })
    }

    #[cfg(not(unix))]
    {
        let _ = (stream, config);
        Ok(())
    }
}

/// Apply the non-absent listener options from `config`: SO_REUSEADDR.
pub fn apply_listener_options(
    listener: &compio::net::TcpListener,
    config: &SocketConfig,
) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        with_socket(listener.as_raw_fd(), |sock| {
            if let Some(reuse) = config.reuse_address {
                sock.set_reuse_address(reuse)?;
            }
            Ok(())
        })
    }

    #[cfg(not(unix))]
    {
        let _ = (listener, config);
        Ok(())
    }
}

/// Shut down one or both directions of a connected socket.
///
/// Used for the graceful FIN on close and to wake a read parked on a
/// descriptor that is being torn down.
pub fn shutdown(stream: &compio::net::TcpStream, how: Shutdown) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        with_socket(stream.as_raw_fd(), |sock| sock.shutdown(how))
    }

    #[cfg(not(unix))]
    {
        let _ = (stream, how);
        Ok(())
    }
}
