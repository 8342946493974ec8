//! Echo client: dials the echo server, sends a framed greeting from
//! `on_connected`, prints the echo, and stops.

use std::sync::Arc;
use std::time::Duration;

use longeron::prelude::*;

struct ClientConfiguration;

impl Configuration for ClientConfiguration {
    fn address(&self) -> (String, u16) {
        ("127.0.0.1".to_string(), 20195)
    }

    fn no_delay(&self) -> Option<bool> {
        Some(true)
    }
}

struct EchoClient {
    controller: Controller,
}

impl Service for EchoClient {
    fn on_connected(&self, sid: Sid) {
        println!("connected: sid={sid}");

        // Frame "Hello" by hand: 4-byte little-endian length + payload.
        let payload = b"Hello";
        let mut wire = Vec::with_capacity(4 + payload.len());
        wire.extend_from_slice(&(payload.len() as i32).to_le_bytes());
        wire.extend_from_slice(payload);

        self.controller.write(sid, &wire);
    }

    fn on_message(&self, sid: Sid, data: &[u8]) {
        println!(
            "echo: sid={sid} payload={:?}",
            String::from_utf8_lossy(data)
        );
    }

    fn on_error(&self, sid: Sid, error: &NetError) {
        println!("error: sid={sid} {error}");
    }

    fn on_close(&self, sid: Sid, error: Option<&NetError>) {
        match error {
            Some(error) => println!("closed: sid={sid} ({error})"),
            None => println!("closed: sid={sid}"),
        }
    }
}

fn main() {
    longeron::dev_tracing::init_tracing();

    let controller = Controller::new(1);
    controller.attach_configuration(Arc::new(ClientConfiguration));
    controller.attach_service(Arc::new(EchoClient {
        controller: controller.clone(),
    }));

    let sid = controller.connect();
    if sid == 0 {
        eprintln!("failed to connect");
        return;
    }

    let mut attempts = 0;
    while !controller.is_state(sid, SessionState::Connected) {
        attempts += 1;
        if attempts > 100 {
            eprintln!("server did not answer");
            controller.stop();
            return;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    // Leave time for the round trip before shutting down.
    std::thread::sleep(Duration::from_secs(1));
    controller.stop();
}
