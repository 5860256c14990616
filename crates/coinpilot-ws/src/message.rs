//! Event types exchanged over the channel.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Event (both directions)
// ============================================================================

/// A tagged message on the channel: `{"type": ..., "payload": ..., ...}`.
///
/// Top-level fields other than `type` and `payload` (e.g. `client_id`,
/// `conversation_id`) are kept in `extra` so nothing is lost on a round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Type tag. Open-ended; see [`EventKind`] for the known inbound tags.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Payload, shape depends on the tag.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
    /// Remaining top-level fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Event {
    /// Create an event with a payload and no extra fields.
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            extra: Map::new(),
        }
    }

    /// Add a top-level field next to `type` and `payload`.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    /// Look up a top-level field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }

    /// The fixed route for this event, if its tag is known.
    pub fn kind(&self) -> Option<EventKind> {
        EventKind::from_tag(&self.event_type)
    }

    /// Parse an inbound text frame.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

// ============================================================================
// Known inbound tags
// ============================================================================

/// Consumer category a known tag belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    Chat,
    Trading,
    Wallet,
    Market,
    Knowledge,
    System,
}

/// Closed set of inbound tags with a fixed consumer route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ChatToken,
    ChatResponse,
    ChatStreamEnd,
    ChatStopped,
    ConversationCleared,
    TradeExecuted,
    NewSignal,
    BotStatus,
    SimulationUpdate,
    PortfolioUpdate,
    WalletUpdate,
    BalanceUpdate,
    PriceUpdate,
    NewsUpdate,
    KnowledgeUpdate,
    EmbeddingProgress,
    Error,
    DebugLog,
    Notification,
    ConnectionAck,
}

impl EventKind {
    /// Every known tag, in table order.
    pub const ALL: [EventKind; 20] = [
        EventKind::ChatToken,
        EventKind::ChatResponse,
        EventKind::ChatStreamEnd,
        EventKind::ChatStopped,
        EventKind::ConversationCleared,
        EventKind::TradeExecuted,
        EventKind::NewSignal,
        EventKind::BotStatus,
        EventKind::SimulationUpdate,
        EventKind::PortfolioUpdate,
        EventKind::WalletUpdate,
        EventKind::BalanceUpdate,
        EventKind::PriceUpdate,
        EventKind::NewsUpdate,
        EventKind::KnowledgeUpdate,
        EventKind::EmbeddingProgress,
        EventKind::Error,
        EventKind::DebugLog,
        EventKind::Notification,
        EventKind::ConnectionAck,
    ];

    /// Wire tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChatToken => "chat_token",
            Self::ChatResponse => "chat_response",
            Self::ChatStreamEnd => "chat_stream_end",
            Self::ChatStopped => "chat_stopped",
            Self::ConversationCleared => "conversation_cleared",
            Self::TradeExecuted => "trade_executed",
            Self::NewSignal => "new_signal",
            Self::BotStatus => "bot_status",
            Self::SimulationUpdate => "simulation_update",
            Self::PortfolioUpdate => "portfolio_update",
            Self::WalletUpdate => "wallet_update",
            Self::BalanceUpdate => "balance_update",
            Self::PriceUpdate => "price_update",
            Self::NewsUpdate => "news_update",
            Self::KnowledgeUpdate => "knowledge_update",
            Self::EmbeddingProgress => "embedding_progress",
            Self::Error => "error",
            Self::DebugLog => "debug_log",
            Self::Notification => "notification",
            Self::ConnectionAck => "connection_ack",
        }
    }

    /// Map a wire tag to its fixed route. Tags outside the table return `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == tag)
    }

    /// Consumer category that owns this tag.
    pub fn category(self) -> EventCategory {
        match self {
            Self::ChatToken
            | Self::ChatResponse
            | Self::ChatStreamEnd
            | Self::ChatStopped
            | Self::ConversationCleared => EventCategory::Chat,
            Self::TradeExecuted
            | Self::NewSignal
            | Self::BotStatus
            | Self::SimulationUpdate
            | Self::PortfolioUpdate => EventCategory::Trading,
            Self::WalletUpdate | Self::BalanceUpdate => EventCategory::Wallet,
            Self::PriceUpdate | Self::NewsUpdate => EventCategory::Market,
            Self::KnowledgeUpdate | Self::EmbeddingProgress => EventCategory::Knowledge,
            Self::Error | Self::DebugLog | Self::Notification | Self::ConnectionAck => {
                EventCategory::System
            }
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Outbound builders
// ============================================================================

/// Hello tag sent once per open.
pub const CLIENT_CONNECTED: &str = "client_connected";

/// Outbound event builders.
pub struct OutboundEvent;

impl OutboundEvent {
    /// Generic `{type, payload}` event.
    pub fn new(event_type: impl Into<String>, payload: Value) -> Event {
        Event::new(event_type, payload)
    }

    /// Hello sent after the channel opens.
    ///
    /// `client_public_ip` is always present on the wire, `null` when unknown.
    pub fn client_connected(client_id: &str, public_ip: Option<String>) -> Event {
        Event::new(CLIENT_CONNECTED, Value::Null)
            .with_field("client_id", client_id)
            .with_field(
                "client_public_ip",
                public_ip.map(Value::String).unwrap_or(Value::Null),
            )
    }

    /// Ask the backend to stop the current chat generation.
    pub fn stop_generation() -> Event {
        Event::new("stop_generation", Value::Object(Map::new()))
    }

    /// Ask the backend to clear a conversation.
    pub fn clear_conversation(conversation_id: &str) -> Event {
        Event::new("clear_conversation", Value::Object(Map::new()))
            .with_field("conversation_id", conversation_id)
    }
}
