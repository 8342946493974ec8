//! Echo server: accepts connections and mirrors every message back.
//!
//! Run with `cargo run --example echo_server`, then start the
//! `echo_client` example in another terminal. Ctrl-C stops the server.

use std::sync::Arc;
use std::time::Duration;

use longeron::prelude::*;

struct ServerConfiguration;

impl Configuration for ServerConfiguration {
    fn address(&self) -> (String, u16) {
        ("127.0.0.1".to_string(), 20195)
    }

    fn reuse_address(&self) -> Option<bool> {
        Some(true)
    }

    fn no_delay(&self) -> Option<bool> {
        Some(true)
    }
}

struct ConsoleLogging;

impl Logging for ConsoleLogging {
    fn trace(&self, message: &str) {
        println!("[TRACE] {message}");
    }

    fn debug(&self, message: &str) {
        println!("[DEBUG] {message}");
    }

    fn info(&self, message: &str) {
        println!("[INFO] {message}");
    }

    fn warn(&self, message: &str) {
        println!("[WARN] {message}");
    }

    fn error(&self, message: &str) {
        println!("[ERROR] {message}");
    }
}

struct EchoServer {
    controller: Controller,
}

impl Service for EchoServer {
    fn on_connected(&self, sid: Sid) {
        println!("connected: sid={sid}");
    }

    fn on_message(&self, sid: Sid, data: &[u8]) {
        println!(
            "message: sid={sid} payload={:?}",
            String::from_utf8_lossy(data)
        );

        let mut reply = WriteBuffer::new();
        reply.put(data);
        reply.commit();
        self.controller.write_buffer(sid, reply);
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

    let controller = Controller::new(2);
    controller.attach_configuration(Arc::new(ServerConfiguration));
    controller.attach_logging(Arc::new(ConsoleLogging));
    controller.attach_service(Arc::new(EchoServer {
        controller: controller.clone(),
    }));

    if !controller.accept() {
        eprintln!("failed to start listener");
        return;
    }

    loop {
        std::thread::sleep(Duration::from_secs(1));
    }
}
