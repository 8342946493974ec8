//! Stop semantics: a controller stop drives every live session to
//! `on_close` and joins its workers within a bounded time, even while
//! traffic is in flight.

use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use longeron::{Configuration, Controller, NetError, Service, SessionState, Sid, WriteBuffer};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

struct Address {
    port: u16,
}

impl Configuration for Address {
    fn address(&self) -> (String, u16) {
        ("127.0.0.1".to_string(), self.port)
    }

    fn reuse_address(&self) -> Option<bool> {
        Some(true)
    }

    fn no_delay(&self) -> Option<bool> {
        Some(true)
    }
}

/// Mirrors every message back, keeping a ping-pong alive indefinitely,
/// and reports closes with whether they carried an error.
struct PingPong {
    controller: OnceLock<Controller>,
    closes: Sender<bool>,
}

impl PingPong {
    fn new(closes: Sender<bool>) -> Arc<Self> {
        Arc::new(Self {
            controller: OnceLock::new(),
            closes,
        })
    }

    fn bind(&self, controller: &Controller) {
        let _ = self.controller.set(controller.clone());
    }
}

impl Service for PingPong {
    fn on_connected(&self, _sid: Sid) {}

    fn on_message(&self, sid: Sid, data: &[u8]) {
        if let Some(controller) = self.controller.get() {
            let mut reply = WriteBuffer::new();
            reply.put(data);
            reply.commit();
            controller.write_buffer(sid, reply);
        }
    }

    fn on_error(&self, _sid: Sid, _error: &NetError) {}

    fn on_close(&self, _sid: Sid, error: Option<&NetError>) {
        let _ = self.closes.send(error.is_some());
    }
}

/// Client that opens the rally from `on_connected`.
struct Opener {
    inner: Arc<PingPong>,
}

impl Service for Opener {
    fn on_connected(&self, sid: Sid) {
        if let Some(controller) = self.inner.controller.get() {
            let mut serve = WriteBuffer::new();
            serve.put(b"ping");
            serve.commit();
            controller.write_buffer(sid, serve);
        }
    }

    fn on_message(&self, sid: Sid, data: &[u8]) {
        self.inner.on_message(sid, data);
    }

    fn on_error(&self, sid: Sid, error: &NetError) {
        self.inner.on_error(sid, error);
    }

    fn on_close(&self, sid: Sid, error: Option<&NetError>) {
        self.inner.on_close(sid, error);
    }
}

#[test]
fn stop_during_traffic_closes_sessions_and_joins() {
    let (server_closes, server_closed) = mpsc::channel();
    let server = Controller::new(2);
    let server_service = PingPong::new(server_closes);
    server_service.bind(&server);
    server.attach_configuration(Arc::new(Address { port: 29521 }));
    server.attach_service(server_service);
    assert!(server.accept());

    let (client_closes, client_closed) = mpsc::channel();
    let client = Controller::new(1);
    let rally = PingPong::new(client_closes);
    rally.bind(&client);
    client.attach_configuration(Arc::new(Address { port: 29521 }));
    client.attach_service(Arc::new(Opener { inner: rally }));

    let sid = client.connect();
    assert_ne!(sid, 0);
    while !client.is_state(sid, SessionState::Connected) {
        std::thread::sleep(Duration::from_millis(10));
    }

    // Let the rally run.
    std::thread::sleep(Duration::from_millis(300));

    let started = Instant::now();
    server.stop();
    client.stop();
    let elapsed = started.elapsed();
    assert!(elapsed < Duration::from_secs(10), "stop took {elapsed:?}");

    // Every session surfaced exactly one close. The server side was
    // aborted by its own stop; the client side observes either its own
    // abort or the server's teardown first.
    let server_side = server_closed.recv_timeout(RECV_TIMEOUT).unwrap();
    assert!(server_side, "server close should carry the abort error");
    client_closed.recv_timeout(RECV_TIMEOUT).unwrap();
    assert!(server_closed.try_recv().is_err());
    assert!(client_closed.try_recv().is_err());

    // Stopping is idempotent and terminal.
    server.stop();
    assert!(!server.accept());
    assert_eq!(client.connect(), 0);
}

#[test]
fn stop_with_no_sessions_is_immediate() {
    let controller = Controller::new(1);
    controller.attach_configuration(Arc::new(Address { port: 29522 }));
    assert!(controller.accept());

    let started = Instant::now();
    controller.stop();
    assert!(started.elapsed() < Duration::from_secs(5));
}
