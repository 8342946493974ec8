//! Controller facade: collaborators, worker pool, connect/accept flows.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use bytes::Bytes;
use flume::{Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use longeron_core::config::{Configuration, SocketConfig};
use longeron_core::error::NetError;
use longeron_core::logging::Logging;
use longeron_core::monitor::Monitor;
use longeron_core::service::{Service, SessionState, Sid};
use longeron_core::tcp;
use longeron_frame::registry::SessionRegistry;
use longeron_frame::session::Collaborators;
use longeron_frame::write_buffer::WriteBuffer;

use crate::signal::{self, SignalGuard};

/// How long `accept` waits for the listener to come up.
const BIND_ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// How long `stop` waits for live sessions to drain before tearing the
/// workers down regardless.
const STOP_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed pool of worker threads, each driving its own single-threaded
/// completion runtime. Jobs are plain closures executed inside a runtime
/// context; anything long-lived spawns itself as a task from there.
/// Sockets stay on the runtime that created them.
struct WorkerPool {
    threads: usize,
    job_tx: Mutex<Option<Sender<Job>>>,
    job_rx: Receiver<Job>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl WorkerPool {
    fn new(threads: usize) -> Self {
        let (job_tx, job_rx) = flume::unbounded();
        Self {
            threads,
            job_tx: Mutex::new(Some(job_tx)),
            job_rx,
            handles: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    fn ensure_started(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut handles = self.handles.lock();
        for index in 0..self.threads {
            let jobs = self.job_rx.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("longeron-worker-{index}"))
                .spawn(move || {
                    let runtime = match compio::runtime::Runtime::new() {
                        Ok(runtime) => runtime,
                        Err(error) => {
                            warn!(%error, "worker runtime failed to start");
                            return;
                        }
                    };
                    runtime.block_on(async move {
                        while let Ok(job) = jobs.recv_async().await {
                            job();
                        }
                    });
                    debug!("worker stopped");
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(error) => warn!(%error, "failed to spawn worker thread"),
            }
        }
    }

    fn dispatch(&self, job: Job) -> bool {
        match self.job_tx.lock().as_ref() {
            Some(sender) => sender.send(job).is_ok(),
            None => false,
        }
    }

    fn shutdown(&self) {
        self.job_tx.lock().take();
        for handle in self.handles.lock().drain(..) {
            let _ = handle.join();
        }
    }
}

struct Inner {
    registry: Arc<SessionRegistry>,
    workers: WorkerPool,
    service: RwLock<Option<Arc<dyn Service>>>,
    logging: RwLock<Option<Arc<dyn Logging>>>,
    monitor: RwLock<Option<Arc<dyn Monitor>>>,
    configuration: RwLock<Option<Arc<dyn Configuration>>>,
    accepting: AtomicBool,
    stopping: AtomicBool,
    signal_guard: Mutex<Option<SignalGuard>>,
}

/// The framework facade.
///
/// Binds the session registry, the worker pool, the collaborator set and
/// a SIGINT/SIGTERM watch. Cloning is cheap and every clone drives the
/// same instance. Teardown is explicit: call [`stop`](Controller::stop).
#[derive(Clone)]
pub struct Controller {
    inner: Arc<Inner>,
}

impl Controller {
    /// Create a controller with a fixed number of worker threads.
    /// `0` means one worker per CPU.
    #[must_use]
    pub fn new(threads: usize) -> Self {
        let threads = if threads == 0 { num_cpus::get() } else { threads };
        let inner = Arc::new(Inner {
            registry: SessionRegistry::new(),
            workers: WorkerPool::new(threads),
            service: RwLock::new(None),
            logging: RwLock::new(None),
            monitor: RwLock::new(None),
            configuration: RwLock::new(None),
            accepting: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
            signal_guard: Mutex::new(None),
        });

        let weak = Arc::downgrade(&inner);
        match signal::watch(move || {
            if let Some(inner) = weak.upgrade() {
                inner.stop();
            }
        }) {
            Ok(guard) => *inner.signal_guard.lock() = Some(guard),
            Err(error) => warn!(%error, "signal watcher unavailable"),
        }

        Self { inner }
    }

    /// Bind the service callbacks. Replaces any prior binding; sessions
    /// created afterwards use the new one.
    pub fn attach_service(&self, service: Arc<dyn Service>) {
        *self.inner.service.write() = Some(service);
    }

    /// Unbind the service callbacks.
    pub fn detach_service(&self) {
        *self.inner.service.write() = None;
    }

    /// Whether a service is attached.
    #[must_use]
    pub fn has_service(&self) -> bool {
        self.inner.service.read().is_some()
    }

    /// Bind the log sink. Replaces any prior binding.
    pub fn attach_logging(&self, logging: Arc<dyn Logging>) {
        *self.inner.logging.write() = Some(logging);
    }

    /// Unbind the log sink.
    pub fn detach_logging(&self) {
        *self.inner.logging.write() = None;
    }

    /// Whether a log sink is attached.
    #[must_use]
    pub fn has_logging(&self) -> bool {
        self.inner.logging.read().is_some()
    }

    /// Bind the traffic monitor. Replaces any prior binding.
    pub fn attach_monitor(&self, monitor: Arc<dyn Monitor>) {
        *self.inner.monitor.write() = Some(monitor);
    }

    /// Unbind the traffic monitor.
    pub fn detach_monitor(&self) {
        *self.inner.monitor.write() = None;
    }

    /// Whether a traffic monitor is attached.
    #[must_use]
    pub fn has_monitor(&self) -> bool {
        self.inner.monitor.read().is_some()
    }

    /// Bind the configuration provider. Required before
    /// [`connect`](Controller::connect) or [`accept`](Controller::accept).
    pub fn attach_configuration(&self, configuration: Arc<dyn Configuration>) {
        *self.inner.configuration.write() = Some(configuration);
    }

    /// Unbind the configuration provider.
    pub fn detach_configuration(&self) {
        *self.inner.configuration.write() = None;
    }

    /// Whether a configuration provider is attached.
    #[must_use]
    pub fn has_configuration(&self) -> bool {
        self.inner.configuration.read().is_some()
    }

    /// Dial the configured address.
    ///
    /// Returns the new session's id immediately; resolution and connect
    /// run asynchronously on a worker. Poll
    /// [`is_state`](Controller::is_state) for `Connected`, or wait for the
    /// service's `on_connected`. Returns `0` when no configuration is
    /// attached or the controller is stopping.
    pub fn connect(&self) -> Sid {
        self.inner.connect()
    }

    /// Bring the listener up and keep accepting connections.
    ///
    /// Lazily binds the configured address (applying the listener options)
    /// on a worker, then accepts in a loop: each accepted socket becomes a
    /// session that is started immediately while the loop re-arms. Returns
    /// whether the listener is up; repeated calls are idempotent.
    pub fn accept(&self) -> bool {
        self.inner.accept()
    }

    /// Send raw, already framed bytes to a session.
    ///
    /// Returns whether the session id was found. The session itself guards
    /// against writes before it is connected.
    pub fn write(&self, sid: Sid, data: &[u8]) -> bool {
        match self.inner.registry.lookup(sid) {
            Some(session) => {
                session.post(Bytes::copy_from_slice(data));
                true
            }
            None => false,
        }
    }

    /// Send a committed [`WriteBuffer`] to a session.
    pub fn write_buffer(&self, sid: Sid, buffer: WriteBuffer) -> bool {
        match self.inner.registry.lookup(sid) {
            Some(session) => {
                session.post_buffer(buffer);
                true
            }
            None => false,
        }
    }

    /// Probe a session's connection state. Unknown ids report `false`.
    #[must_use]
    pub fn is_state(&self, sid: Sid, state: SessionState) -> bool {
        self.inner
            .registry
            .lookup(sid)
            .is_some_and(|session| session.is_state(state))
    }

    /// Close every session and join the worker threads.
    ///
    /// Outstanding sessions observe `on_close` with an aborted error.
    /// Idempotent, and bounded: sessions get [`STOP_DRAIN_TIMEOUT`] to
    /// drain before the workers are torn down regardless.
    pub fn stop(&self) {
        self.inner.stop();
    }
}

impl Inner {
    fn collaborators(&self) -> Collaborators {
        Collaborators {
            service: self.service.read().clone(),
            logging: self.logging.read().clone(),
            monitor: self.monitor.read().clone(),
        }
    }

    fn connect(self: &Arc<Self>) -> Sid {
        if self.stopping.load(Ordering::SeqCst) {
            return 0;
        }
        let Some(configuration) = self.configuration.read().clone() else {
            warn!("connect without a configuration");
            return 0;
        };

        let (host, port) = configuration.address();
        let config = SocketConfig::capture(configuration.as_ref());

        self.workers.ensure_started();

        let session = self.registry.create(self.collaborators(), config);
        let sid = session.sid();

        let task = session.clone();
        let dispatched = self.workers.dispatch(Box::new(move || {
            compio::runtime::spawn(task.resolve(host, port)).detach();
        }));
        if !dispatched {
            self.registry.remove(sid);
            return 0;
        }

        debug!(sid, "connect dispatched");
        sid
    }

    fn accept(self: &Arc<Self>) -> bool {
        if self.stopping.load(Ordering::SeqCst) {
            return false;
        }
        let Some(configuration) = self.configuration.read().clone() else {
            warn!("accept without a configuration");
            return false;
        };
        if self.accepting.swap(true, Ordering::SeqCst) {
            return true;
        }

        let (host, port) = configuration.address();
        let config = SocketConfig::capture(configuration.as_ref());

        self.workers.ensure_started();

        let (ack_tx, ack_rx) = flume::bounded(1);
        let inner = self.clone();
        let dispatched = self.workers.dispatch(Box::new(move || {
            compio::runtime::spawn(accept_loop(inner, host, port, config, ack_tx)).detach();
        }));
        if !dispatched {
            self.accepting.store(false, Ordering::SeqCst);
            return false;
        }

        match ack_rx.recv_timeout(BIND_ACK_TIMEOUT) {
            Ok(Ok(())) => true,
            Ok(Err(error)) => {
                warn!(%error, "listener failed to bind");
                self.accepting.store(false, Ordering::SeqCst);
                false
            }
            Err(_) => {
                warn!("listener start timed out");
                self.accepting.store(false, Ordering::SeqCst);
                false
            }
        }
    }

    fn stop(&self) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("controller stopping");

        if let Some(guard) = self.signal_guard.lock().take() {
            guard.close();
        }

        for session in self.registry.snapshot() {
            session.post_close(Some(NetError::Aborted));
        }

        // Give sessions a bounded window to run their teardown before the
        // runtimes go away with them.
        let deadline = Instant::now() + STOP_DRAIN_TIMEOUT;
        while !self.registry.is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        if !self.registry.is_empty() {
            warn!(live = self.registry.len(), "stopping with sessions undrained");
        }

        self.workers.shutdown();
        info!("controller stopped");
    }
}

/// The accept loop task. Binds lazily, then accepts and starts sessions
/// until the controller stops or the runtime is torn down.
async fn accept_loop(
    inner: Arc<Inner>,
    host: String,
    port: u16,
    config: SocketConfig,
    ack: Sender<std::io::Result<()>>,
) {
    let listener = match compio::net::TcpListener::bind((host.as_str(), port)).await {
        Ok(listener) => listener,
        Err(error) => {
            let _ = ack.send(Err(error));
            return;
        }
    };

    if let Err(error) = tcp::apply_listener_options(&listener, &config) {
        warn!(%error, "failed to apply listener options");
    }

    info!(%host, port, "listening");
    let _ = ack.send(Ok(()));

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                if inner.stopping.load(Ordering::SeqCst) {
                    break;
                }
                debug!(%peer, "accepted");
                let session = inner
                    .registry
                    .create(inner.collaborators(), config.clone());
                session.start(stream);
            }
            Err(error) => {
                if inner.stopping.load(Ordering::SeqCst) {
                    break;
                }
                warn!(%error, "accept failed");
            }
        }
    }
}
