//! Per-connection session.
//!
//! One session == one TCP connection, realised as three cooperating tasks
//! on the same runtime:
//!
//! - **read pump**: kernel -> session (scratch reads forwarded as events)
//! - **write pump**: session -> kernel (one chunk at a time)
//! - **session task**: the serial context that owns every piece of
//!   mutable state (reassembly buffer, write queue, write state) and is
//!   the only place callbacks fire
//!
//! External writes and closes arrive over the command channel and are
//! processed strictly after whatever the session task is currently
//! handling, so handlers never overlap. The pumps own no state beyond the
//! socket; completions are reported back as events.
//!
//! Lifecycle: `None -> Connecting -> Connected -> Closed`, no revival.
//! Accepted sockets skip `Connecting`. Every transport failure is
//! terminal and funnels into [`Session::post_close`]-equivalent teardown
//! with exactly one `on_close`.

use std::fmt;
use std::net::Shutdown;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use compio::buf::BufResult;
use compio::io::{AsyncRead, AsyncWriteExt};
use compio::net::TcpStream;
use flume::{Receiver, Sender};
use futures::{select, FutureExt};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use longeron_core::arena::ReadArena;
use longeron_core::buffer::StreamBuffer;
use longeron_core::config::SocketConfig;
use longeron_core::error::NetError;
use longeron_core::logging::{LogLevel, Logging};
use longeron_core::monitor::Monitor;
use longeron_core::service::{Service, SessionState, Sid, StateCell};
use longeron_core::tcp;

use crate::codec::FrameDecoder;
use crate::write_buffer::WriteBuffer;
use crate::write_queue::{BufferKind, WriteQueue};

/// Collaborators a session captures at creation time.
///
/// All are optional; the session null-checks before every dispatch, so a
/// controller running without a monitor (or with a collaborator detached
/// mid-flight) never faults.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub service: Option<Arc<dyn Service>>,
    pub logging: Option<Arc<dyn Logging>>,
    pub monitor: Option<Arc<dyn Monitor>>,
}

/// Hook invoked from teardown to drop the registry entry.
pub type DestroyFn = Box<dyn Fn(Sid) + Send + Sync>;

/// Commands accepted by the session task.
enum SessionCmd {
    Write(Bytes),
    Close(Option<NetError>),
}

/// Completions reported by the pumps.
enum PumpEvent {
    /// Bytes arrived from the peer.
    Received(Bytes),
    /// The read side is done: `None` is a clean EOF.
    ReadClosed(Option<std::io::Error>),
    /// An outbound chunk was fully written.
    Sent(usize),
    /// An outbound chunk failed; `sent` bytes of it had been confirmed.
    WriteFailed {
        sent: usize,
        error: std::io::Error,
    },
}

/// Whether a socket write is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteState {
    Idle,
    Writing,
}

/// Handle to one live connection.
///
/// Cheap to share: the registry holds one strong reference and every
/// pending task holds another, so the session is destroyed exactly when
/// the registry entry is gone and the last completion resolves.
pub struct Session {
    sid: AtomicU64,
    state: StateCell,
    cmd_tx: Sender<SessionCmd>,
    cmd_rx: Mutex<Option<Receiver<SessionCmd>>>,
    collaborators: Collaborators,
    config: SocketConfig,
    destroy: DestroyFn,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("sid", &self.sid())
            .field("state", &self.state.load())
            .finish()
    }
}

impl Session {
    pub(crate) fn new(
        sid: Sid,
        collaborators: Collaborators,
        config: SocketConfig,
        destroy: DestroyFn,
    ) -> Arc<Self> {
        let (cmd_tx, cmd_rx) = flume::unbounded();
        Arc::new(Self {
            sid: AtomicU64::new(sid),
            state: StateCell::new(SessionState::None),
            cmd_tx,
            cmd_rx: Mutex::new(Some(cmd_rx)),
            collaborators,
            config,
            destroy,
        })
    }

    /// Current session id; `0` once the session has been torn down.
    #[inline]
    pub fn sid(&self) -> Sid {
        self.sid.load(Ordering::Relaxed)
    }

    /// Relaxed state probe, callable from any thread.
    #[inline]
    pub fn is_state(&self, state: SessionState) -> bool {
        self.state.is(state)
    }

    /// Resolve and connect, then hand the socket to [`start`](Self::start).
    ///
    /// Runs on a worker runtime. Resolution failures and connect failures
    /// (across every resolved endpoint) surface one `on_error` and close
    /// the session without it ever reaching `Connected`.
    pub async fn resolve(self: Arc<Self>, host: String, port: u16) {
        self.state.store(SessionState::Connecting);
        self.log(LogLevel::Debug, format_args!("resolving {host}:{port}"));

        match TcpStream::connect((host.as_str(), port)).await {
            Ok(stream) => {
                self.start(stream);
            }
            Err(error) => {
                warn!(sid = self.sid(), %error, "connect failed");
                self.log(LogLevel::Error, format_args!("connect failed: {error}"));
                let error = NetError::from(error);
                self.dispatch_error(&error);
                self.teardown(Some(error));
            }
        }
    }

    /// Bring an accepted or freshly connected socket to life.
    ///
    /// Must run on the runtime that created `stream`. Arms the read pump
    /// before `on_connected` fires, and fires `on_connected` from the same
    /// serial context that will deliver every `on_message`.
    pub fn start(self: &Arc<Self>, stream: TcpStream) {
        if let Err(error) = tcp::apply_stream_options(&stream, &self.config) {
            warn!(sid = self.sid(), %error, "failed to apply socket options");
        }

        self.state.store(SessionState::Connected);
        let session = self.clone();
        compio::runtime::spawn(session.run(stream)).detach();
    }

    /// Queue raw, already framed bytes for transmission.
    ///
    /// Returns `false` (after a synchronous `on_error(NotConnected)`) when
    /// the session is not connected; the session stays open.
    pub fn post(&self, data: Bytes) -> bool {
        if !self.is_state(SessionState::Connected) {
            self.dispatch_error(&NetError::NotConnected);
            return false;
        }

        if let Some(monitor) = &self.collaborators.monitor {
            monitor.on_send();
        }
        self.cmd_tx.send(SessionCmd::Write(data)).is_ok()
    }

    /// Queue a committed [`WriteBuffer`] for transmission.
    pub fn post_buffer(&self, buffer: WriteBuffer) -> bool {
        self.post(buffer.into_bytes())
    }

    /// Queue an orderly close. Safe from any state; the teardown runs on
    /// the session task so it never races in-flight completions.
    pub fn post_close(&self, error: Option<NetError>) {
        if self.cmd_tx.send(SessionCmd::Close(error)).is_err() {
            trace!(sid = self.sid(), "close posted to finished session");
        }
    }

    /// The session task: owns all connection state, serialises callbacks.
    async fn run(self: Arc<Self>, stream: TcpStream) {
        let cmd_rx = self
            .cmd_rx
            .lock()
            .take()
            .expect("session started more than once");

        let stream = Rc::new(stream);
        let (event_tx, event_rx) = flume::unbounded();
        let (chunk_tx, chunk_rx) = flume::unbounded();

        compio::runtime::spawn(read_pump(stream.clone(), event_tx.clone())).detach();
        compio::runtime::spawn(write_pump(stream.clone(), chunk_rx, event_tx)).detach();

        self.dispatch_connected();

        let decoder = match self.config.max_message_size {
            Some(limit) => FrameDecoder::with_limit(limit),
            None => FrameDecoder::new(),
        };
        let mut inbound = StreamBuffer::new();
        let mut queue = WriteQueue::new();
        let mut write_state = WriteState::Idle;

        let close_error = loop {
            select! {
                event = event_rx.recv_async().fuse() => match event {
                    Ok(PumpEvent::Received(bytes)) => {
                        if let Some(monitor) = &self.collaborators.monitor {
                            monitor.on_receive();
                        }
                        inbound.write(&bytes);
                        if let Err(error) = self.drain_messages(&decoder, &mut inbound) {
                            self.log(
                                LogLevel::Error,
                                format_args!("protocol violation: {error}"),
                            );
                            self.dispatch_error(&error);
                            break Some(error);
                        }
                    }
                    Ok(PumpEvent::ReadClosed(None)) => {
                        trace!(sid = self.sid(), "peer closed");
                        break None;
                    }
                    Ok(PumpEvent::ReadClosed(Some(error))) => {
                        self.log(LogLevel::Error, format_args!("read failed: {error}"));
                        let error = NetError::from(error);
                        self.dispatch_error(&error);
                        break Some(error);
                    }
                    Ok(PumpEvent::Sent(n)) => {
                        queue.consume(n);
                        if let Some(monitor) = &self.collaborators.monitor {
                            monitor.on_sent();
                        }
                        write_state = WriteState::Idle;
                        match queue.transmissible() {
                            BufferKind::None => {}
                            kind => {
                                if kind == BufferKind::Current {
                                    queue.switch();
                                }
                                write_state = WriteState::Writing;
                                let _ = chunk_tx.send(queue.writing_chunk());
                            }
                        }
                    }
                    Ok(PumpEvent::WriteFailed { sent, error }) => {
                        queue.consume(sent);
                        self.log(LogLevel::Error, format_args!("write failed: {error}"));
                        let error = NetError::from(error);
                        self.dispatch_error(&error);
                        break Some(error);
                    }
                    Err(_) => break None,
                },
                cmd = cmd_rx.recv_async().fuse() => match cmd {
                    Ok(SessionCmd::Write(data)) => {
                        queue.put(&data);
                        if write_state == WriteState::Idle {
                            queue.switch();
                            write_state = WriteState::Writing;
                            let _ = chunk_tx.send(queue.writing_chunk());
                        }
                    }
                    Ok(SessionCmd::Close(error)) => break error,
                    Err(_) => break None,
                },
            }
        };

        self.close(&stream, close_error);
        // Dropping `chunk_tx` ends the write pump; the shutdown in `close`
        // wakes the read pump off the descriptor.
    }

    fn drain_messages(
        &self,
        decoder: &FrameDecoder,
        inbound: &mut StreamBuffer,
    ) -> Result<(), NetError> {
        while let Some(message) = decoder.decode(inbound)? {
            self.dispatch_message(&message);
        }
        Ok(())
    }

    /// Orderly teardown with the socket still in hand.
    fn close(&self, stream: &TcpStream, error: Option<NetError>) {
        // Graceful FIN when there is no upstream error; on failure the
        // same shutdown unblocks the parked read so the descriptor is
        // released as the pumps exit. An aborted session's socket is
        // already being torn down by the runtime.
        if !error.as_ref().is_some_and(NetError::is_aborted) {
            let _ = tcp::shutdown(stream, Shutdown::Both);
        }
        self.teardown(error);
    }

    /// Shared tail of every close path: last callback, registry removal,
    /// id cleared, terminal state.
    fn teardown(&self, error: Option<NetError>) {
        let sid = self.sid();
        debug!(sid, "session closed");
        self.log(LogLevel::Info, format_args!("closed"));

        self.dispatch_close(error.as_ref());
        (self.destroy)(sid);
        self.sid.store(0, Ordering::Relaxed);
        self.state.store(SessionState::Closed);
    }

    fn dispatch_connected(&self) {
        if let Some(service) = &self.collaborators.service {
            service.on_connected(self.sid());
        }
    }

    fn dispatch_message(&self, data: &[u8]) {
        if let Some(service) = &self.collaborators.service {
            service.on_message(self.sid(), data);
        }
    }

    fn dispatch_error(&self, error: &NetError) {
        if let Some(service) = &self.collaborators.service {
            service.on_error(self.sid(), error);
        }
    }

    fn dispatch_close(&self, error: Option<&NetError>) {
        if let Some(service) = &self.collaborators.service {
            service.on_close(self.sid(), error);
        }
    }

    fn log(&self, level: LogLevel, message: fmt::Arguments<'_>) {
        if let Some(logging) = &self.collaborators.logging {
            logging.log(level, &format!("sid={} {message}", self.sid()));
        }
    }
}

/// Kernel -> session. Owns the scratch arena; every completed read is
/// frozen into `Bytes` and forwarded. Exits on EOF, error, or when the
/// session task is gone.
async fn read_pump(stream: Rc<TcpStream>, events: Sender<PumpEvent>) {
    let mut arena = ReadArena::new();
    loop {
        let scratch = arena.scratch();
        let mut reader = &*stream;
        let BufResult(result, scratch) = reader.read(scratch).await;
        match result {
            Ok(0) => {
                let _ = events.send(PumpEvent::ReadClosed(None));
                break;
            }
            Ok(n) => {
                trace!(n, "read completion");
                if events.send(PumpEvent::Received(scratch.freeze())).is_err() {
                    break;
                }
            }
            Err(error) => {
                let _ = events.send(PumpEvent::ReadClosed(Some(error)));
                break;
            }
        }
    }
}

/// Session -> kernel. Writes one chunk at a time, so the session's
/// idle/writing flag is authoritative: a new chunk is only ever submitted
/// after the previous completion was reported.
async fn write_pump(stream: Rc<TcpStream>, chunks: Receiver<Vec<u8>>, events: Sender<PumpEvent>) {
    while let Ok(chunk) = chunks.recv_async().await {
        let len = chunk.len();
        let mut writer = &*stream;
        let BufResult(result, _) = writer.write_all(chunk).await;
        let event = match result {
            Ok(()) => {
                trace!(len, "write completion");
                PumpEvent::Sent(len)
            }
            Err(error) => PumpEvent::WriteFailed { sent: 0, error },
        };
        if events.send(event).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct Recorder {
        errors: StdMutex<Vec<String>>,
        closes: StdMutex<usize>,
    }

    impl Service for Recorder {
        fn on_connected(&self, _sid: Sid) {}

        fn on_message(&self, _sid: Sid, _data: &[u8]) {}

        fn on_error(&self, _sid: Sid, error: &NetError) {
            self.errors.lock().unwrap().push(error.to_string());
        }

        fn on_close(&self, _sid: Sid, _error: Option<&NetError>) {
            *self.closes.lock().unwrap() += 1;
        }
    }

    fn session_with(recorder: Arc<Recorder>) -> Arc<Session> {
        Session::new(
            7,
            Collaborators {
                service: Some(recorder),
                ..Collaborators::default()
            },
            SocketConfig::default(),
            Box::new(|_| {}),
        )
    }

    #[test]
    fn post_before_connect_reports_not_connected() {
        let recorder = Arc::new(Recorder::default());
        let session = session_with(recorder.clone());

        assert!(!session.post(Bytes::from_static(b"nope")));

        let errors = recorder.errors.lock().unwrap();
        assert_eq!(errors.as_slice(), ["not_connected"]);
        // The usage error must not close the session.
        assert_eq!(*recorder.closes.lock().unwrap(), 0);
        assert!(session.is_state(SessionState::None));
    }

    #[test]
    fn sid_is_stable_until_teardown() {
        let recorder = Arc::new(Recorder::default());
        let session = session_with(recorder.clone());
        assert_eq!(session.sid(), 7);

        session.teardown(None);
        assert_eq!(session.sid(), 0);
        assert!(session.is_state(SessionState::Closed));
        assert_eq!(*recorder.closes.lock().unwrap(), 1);
    }

    #[test]
    fn missing_service_never_faults() {
        let session = Session::new(
            9,
            Collaborators::default(),
            SocketConfig::default(),
            Box::new(|_| {}),
        );
        assert!(!session.post(Bytes::from_static(b"x")));
        session.teardown(Some(NetError::Aborted));
        assert!(session.is_state(SessionState::Closed));
    }
}
