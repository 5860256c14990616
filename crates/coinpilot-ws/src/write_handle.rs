//! Cloneable handle for sending events.
//!
//! Sending never waits and never queues across connections: if the channel
//! is not open the event is dropped and `false` is returned.

use crate::state::ChannelState;
use coinpilot_telemetry::Metrics;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

/// Handle for writing events to the channel.
///
/// Obtained from [`crate::ConnectionManager::sender`]; stays valid across
/// reconnections.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<String>,
    state: Arc<RwLock<ChannelState>>,
}

impl EventSender {
    pub(crate) fn new(tx: mpsc::Sender<String>, state: Arc<RwLock<ChannelState>>) -> Self {
        Self { tx, state }
    }

    /// Serialize and queue an event for the open transport.
    ///
    /// Returns `false` without writing anything when the channel is not
    /// open, the write buffer is full, or serialization fails.
    pub fn send<T: Serialize>(&self, event: &T) -> bool {
        if !self.is_open() {
            debug!("Send refused: channel not open");
            Metrics::send_rejected("not_open");
            return false;
        }

        let value = match serde_json::to_value(event) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Send refused: event does not serialize");
                Metrics::send_rejected("serialize");
                return false;
            }
        };
        let event_type = value
            .get("type")
            .and_then(|t| t.as_str())
            .unwrap_or("untyped")
            .to_string();

        if self.enqueue(value.to_string()) {
            Metrics::event_sent(&event_type);
            true
        } else {
            false
        }
    }

    /// Queue a pre-serialized frame.
    pub fn send_text(&self, text: String) -> bool {
        if !self.is_open() {
            debug!("Send refused: channel not open");
            Metrics::send_rejected("not_open");
            return false;
        }
        self.enqueue(text)
    }

    fn enqueue(&self, text: String) -> bool {
        match self.tx.try_send(text) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Send refused: write buffer full");
                Metrics::send_rejected("buffer_full");
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Send refused: connection manager dropped");
                Metrics::send_rejected("closed");
                false
            }
        }
    }

    /// Whether the channel is currently open.
    pub fn is_open(&self) -> bool {
        *self.state.read() == ChannelState::Open && !self.tx.is_closed()
    }

    /// Current channel state.
    pub fn state(&self) -> ChannelState {
        *self.state.read()
    }
}

impl std::fmt::Debug for EventSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSender")
            .field("state", &self.state())
            .finish()
    }
}
