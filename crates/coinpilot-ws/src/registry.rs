//! Registry of handlers for events outside the fixed dispatch table.
//!
//! Handlers are tried in registration order and the first one that returns
//! [`Handled::Yes`] owns the event; later handlers never see it. A handler
//! that errors or panics is logged and counted as having declined.

use crate::message::Event;
use coinpilot_telemetry::Metrics;
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{trace, warn};

/// Whether a handler took ownership of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    Yes,
    No,
}

impl From<bool> for Handled {
    fn from(claimed: bool) -> Self {
        if claimed {
            Handled::Yes
        } else {
            Handled::No
        }
    }
}

/// Error returned by a handler. Treated as a decline.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Handler return type.
pub type HandlerResult = Result<Handled, HandlerError>;

/// A predicate-handler for custom event types.
///
/// Return `Handled::Yes` only when the event was fully processed.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &Event) -> HandlerResult;
}

impl<F> EventHandler for F
where
    F: Fn(&Event) -> HandlerResult + Send + Sync,
{
    fn handle(&self, event: &Event) -> HandlerResult {
        self(event)
    }
}

/// Append-only, ordered handler list.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler. No dedup, no priority.
    pub fn register(&self, handler: Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.write();
        handlers.push(handler);
        trace!(count = handlers.len(), "Handler registered");
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Offer the event to each handler in order.
    ///
    /// Returns the index of the handler that claimed it. Handlers run against
    /// a snapshot of the list, so a handler may register more handlers.
    pub fn dispatch(&self, event: &Event) -> Option<usize> {
        let snapshot: Vec<Arc<dyn EventHandler>> = self.handlers.read().clone();

        for (index, handler) in snapshot.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| handler.handle(event))) {
                Ok(Ok(Handled::Yes)) => {
                    trace!(index, event_type = %event.event_type, "Handler claimed event");
                    return Some(index);
                }
                Ok(Ok(Handled::No)) => {}
                Ok(Err(e)) => {
                    warn!(index, event_type = %event.event_type, error = %e, "Handler failed");
                    Metrics::handler_failed();
                }
                Err(_) => {
                    warn!(index, event_type = %event.event_type, "Handler panicked");
                    Metrics::handler_failed();
                }
            }
        }

        None
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.len())
            .finish()
    }
}
