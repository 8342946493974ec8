//! Embedder-supplied log sink.
//!
//! The framework's own diagnostics go through `tracing`; this trait is the
//! application-facing sink a controller can attach so session lifecycle
//! lines end up in the embedder's logging pipeline.

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Log sink collaborator. Must outlive the controller it is attached to.
pub trait Logging: Send + Sync {
    fn trace(&self, message: &str);
    fn debug(&self, message: &str);
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);

    /// Dispatch by level.
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Trace => self.trace(message),
            LogLevel::Debug => self.debug(message),
            LogLevel::Info => self.info(message),
            LogLevel::Warn => self.warn(message),
            LogLevel::Error => self.error(message),
        }
    }
}
