//! Connection status reporting hook.

/// What the status indicator shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

/// External observer of channel liveness (e.g. a status indicator).
///
/// Called on every open and every close, including failed connect attempts.
/// Not consulted by any lifecycle decision.
pub trait StatusObserver: Send + Sync {
    fn on_status(&self, status: ConnectionStatus);
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStatusObserver;

impl StatusObserver for NoopStatusObserver {
    fn on_status(&self, _status: ConnectionStatus) {}
}
