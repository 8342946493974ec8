//! Traffic monitoring collaborator.

/// Counters for outbound and inbound traffic.
///
/// `on_send` fires when a write is accepted into a session's queue,
/// `on_sent` when a socket write completes, `on_receive` once per read
/// completion. Implementations are typically atomic counters feeding a
/// metrics pipeline.
pub trait Monitor: Send + Sync {
    /// A write was queued on a session.
    fn on_send(&self);

    /// A socket write completed.
    fn on_sent(&self);

    /// A socket read completed.
    fn on_receive(&self);
}
