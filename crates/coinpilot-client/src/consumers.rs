//! Event consumers for the command-line client.
//!
//! The dashboard renders these events; the CLI logs them instead.

use chrono::{DateTime, Utc};
use coinpilot_ws::{
    ChatEventSink, ConnectionStatus, Event, EventHandler, Handled, HandlerResult,
    KnowledgeEventSink, MarketEventSink, StatusObserver, SystemEventSink, TradingEventSink,
    WalletEventSink,
};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info, trace, warn};

// ============================================================================
// LogConsumer
// ============================================================================

/// Logs every routed event as a structured tracing event.
#[derive(Debug, Default)]
pub struct LogConsumer {
    events: AtomicU64,
}

impl LogConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events seen so far.
    pub fn events(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }

    fn seen(&self) {
        self.events.fetch_add(1, Ordering::Relaxed);
    }
}

impl ChatEventSink for LogConsumer {
    fn on_chat_token(&self, payload: &Value) {
        self.seen();
        // One per streamed token.
        trace!(token = %text_field(payload, "token"), "chat_token");
    }

    fn on_chat_response(&self, payload: &Value) {
        self.seen();
        info!(
            conversation_id = %text_field(payload, "conversation_id"),
            len = text_field(payload, "response").len(),
            "Chat response"
        );
    }

    fn on_chat_stream_end(&self, payload: &Value) {
        self.seen();
        debug!(?payload, "Chat stream ended");
    }

    fn on_chat_stopped(&self, payload: &Value) {
        self.seen();
        info!(?payload, "Chat generation stopped");
    }

    fn on_conversation_cleared(&self, payload: &Value) {
        self.seen();
        info!(
            conversation_id = %text_field(payload, "conversation_id"),
            "Conversation cleared"
        );
    }
}

impl TradingEventSink for LogConsumer {
    fn on_trade_executed(&self, payload: &Value) {
        self.seen();
        info!(
            symbol = %text_field(payload, "symbol"),
            side = %text_field(payload, "side"),
            ?payload,
            "Trade executed"
        );
    }

    fn on_new_signal(&self, payload: &Value) {
        self.seen();
        info!(symbol = %text_field(payload, "symbol"), ?payload, "New signal");
    }

    fn on_bot_status(&self, payload: &Value) {
        self.seen();
        info!(
            bot = %text_field(payload, "bot_id"),
            status = %text_field(payload, "status"),
            "Bot status"
        );
    }

    fn on_simulation_update(&self, payload: &Value) {
        self.seen();
        debug!(?payload, "Simulation update");
    }

    fn on_portfolio_update(&self, payload: &Value) {
        self.seen();
        debug!(?payload, "Portfolio update");
    }
}

impl WalletEventSink for LogConsumer {
    fn on_wallet_update(&self, payload: &Value) {
        self.seen();
        debug!(?payload, "Wallet update");
    }

    fn on_balance_update(&self, payload: &Value) {
        self.seen();
        debug!(?payload, "Balance update");
    }
}

impl MarketEventSink for LogConsumer {
    fn on_price_update(&self, payload: &Value) {
        self.seen();
        let assets = payload.as_object().map(|m| m.len()).unwrap_or(0);
        debug!(assets, "Price update");
    }

    fn on_news_update(&self, payload: &Value) {
        self.seen();
        let items = payload.as_array().map(|a| a.len()).unwrap_or(1);
        debug!(items, "News update");
    }
}

impl KnowledgeEventSink for LogConsumer {
    fn on_knowledge_update(&self, payload: &Value) {
        self.seen();
        info!(?payload, "Knowledge base updated");
    }

    fn on_embedding_progress(&self, payload: &Value) {
        self.seen();
        debug!(progress = ?payload.get("progress"), "Embedding progress");
    }
}

impl SystemEventSink for LogConsumer {
    fn on_error(&self, payload: &Value) {
        self.seen();
        warn!(message = %text_field(payload, "message"), "Backend reported error");
    }

    fn on_debug_log(&self, payload: &Value) {
        self.seen();
        debug!(?payload, "Backend debug log");
    }

    fn on_notification(&self, payload: &Value) {
        self.seen();
        info!(message = %text_field(payload, "message"), "Notification");
    }

    fn on_connection_ack(&self, payload: &Value) {
        self.seen();
        info!(?payload, "Backend acknowledged connection");
    }
}

/// String field of an object payload, or empty.
fn text_field<'a>(payload: &'a Value, name: &str) -> &'a str {
    payload.get(name).and_then(Value::as_str).unwrap_or("")
}

// ============================================================================
// StatusIndicator
// ============================================================================

/// Tracks the last reported channel status.
#[derive(Debug, Default)]
pub struct StatusIndicator {
    connected: AtomicBool,
    last_change: Mutex<Option<DateTime<Utc>>>,
}

impl StatusIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn last_change(&self) -> Option<DateTime<Utc>> {
        *self.last_change.lock()
    }
}

impl StatusObserver for StatusIndicator {
    fn on_status(&self, status: ConnectionStatus) {
        let connected = status == ConnectionStatus::Connected;
        let was = self.connected.swap(connected, Ordering::SeqCst);
        *self.last_change.lock() = Some(Utc::now());

        match (was, connected) {
            (false, true) => info!("Status: connected"),
            (true, false) => warn!("Status: disconnected"),
            _ => debug!(connected, "Status unchanged"),
        }
    }
}

// ============================================================================
// PriceAlertHandler
// ============================================================================

/// Event type claimed by [`PriceAlertHandler`].
pub const PRICE_ALERT: &str = "price_alert";

#[derive(Debug, Deserialize)]
struct PriceAlert {
    symbol: String,
    price: f64,
    #[serde(default)]
    threshold: Option<f64>,
}

/// Claims `price_alert` events, which have no fixed route.
#[derive(Debug, Default)]
pub struct PriceAlertHandler {
    alerts: AtomicU64,
}

impl PriceAlertHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Alerts handled so far.
    pub fn alerts(&self) -> u64 {
        self.alerts.load(Ordering::Relaxed)
    }
}

impl EventHandler for PriceAlertHandler {
    fn handle(&self, event: &Event) -> HandlerResult {
        if event.event_type != PRICE_ALERT {
            return Ok(Handled::No);
        }

        let alert: PriceAlert = serde_json::from_value(event.payload.clone())?;
        self.alerts.fetch_add(1, Ordering::Relaxed);
        warn!(
            symbol = %alert.symbol,
            price = alert.price,
            threshold = ?alert.threshold,
            "Price alert"
        );
        Ok(Handled::Yes)
    }
}
