//! Consumer contracts for the fixed dispatch table.
//!
//! Each category of known tags has one trait with one method per tag. The
//! connection manager holds an optional implementation per category; a
//! missing consumer turns the route into a no-op.

use crate::message::{EventCategory, EventKind};
use serde_json::Value;
use std::sync::Arc;
use tracing::trace;

/// Chat streaming consumer.
pub trait ChatEventSink: Send + Sync {
    fn on_chat_token(&self, payload: &Value);
    fn on_chat_response(&self, payload: &Value);
    fn on_chat_stream_end(&self, payload: &Value);
    fn on_chat_stopped(&self, payload: &Value);
    fn on_conversation_cleared(&self, payload: &Value);
}

/// Trading bots, signals and simulations.
pub trait TradingEventSink: Send + Sync {
    fn on_trade_executed(&self, payload: &Value);
    fn on_new_signal(&self, payload: &Value);
    fn on_bot_status(&self, payload: &Value);
    fn on_simulation_update(&self, payload: &Value);
    fn on_portfolio_update(&self, payload: &Value);
}

/// Wallet consumer.
pub trait WalletEventSink: Send + Sync {
    fn on_wallet_update(&self, payload: &Value);
    fn on_balance_update(&self, payload: &Value);
}

/// Market data consumer (price ticks, news).
pub trait MarketEventSink: Send + Sync {
    fn on_price_update(&self, payload: &Value);
    fn on_news_update(&self, payload: &Value);
}

/// Knowledge base consumer.
pub trait KnowledgeEventSink: Send + Sync {
    fn on_knowledge_update(&self, payload: &Value);
    fn on_embedding_progress(&self, payload: &Value);
}

/// Backend notices.
pub trait SystemEventSink: Send + Sync {
    fn on_error(&self, payload: &Value);
    fn on_debug_log(&self, payload: &Value);
    fn on_notification(&self, payload: &Value);
    fn on_connection_ack(&self, payload: &Value);
}

/// Consumers injected at construction, one optional slot per category.
#[derive(Clone, Default)]
pub struct EventSinks {
    chat: Option<Arc<dyn ChatEventSink>>,
    trading: Option<Arc<dyn TradingEventSink>>,
    wallet: Option<Arc<dyn WalletEventSink>>,
    market: Option<Arc<dyn MarketEventSink>>,
    knowledge: Option<Arc<dyn KnowledgeEventSink>>,
    system: Option<Arc<dyn SystemEventSink>>,
}

impl EventSinks {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_chat(mut self, sink: Arc<dyn ChatEventSink>) -> Self {
        self.chat = Some(sink);
        self
    }

    #[must_use]
    pub fn with_trading(mut self, sink: Arc<dyn TradingEventSink>) -> Self {
        self.trading = Some(sink);
        self
    }

    #[must_use]
    pub fn with_wallet(mut self, sink: Arc<dyn WalletEventSink>) -> Self {
        self.wallet = Some(sink);
        self
    }

    #[must_use]
    pub fn with_market(mut self, sink: Arc<dyn MarketEventSink>) -> Self {
        self.market = Some(sink);
        self
    }

    #[must_use]
    pub fn with_knowledge(mut self, sink: Arc<dyn KnowledgeEventSink>) -> Self {
        self.knowledge = Some(sink);
        self
    }

    #[must_use]
    pub fn with_system(mut self, sink: Arc<dyn SystemEventSink>) -> Self {
        self.system = Some(sink);
        self
    }

    /// Whether a consumer is installed for the category.
    pub fn has(&self, category: EventCategory) -> bool {
        match category {
            EventCategory::Chat => self.chat.is_some(),
            EventCategory::Trading => self.trading.is_some(),
            EventCategory::Wallet => self.wallet.is_some(),
            EventCategory::Market => self.market.is_some(),
            EventCategory::Knowledge => self.knowledge.is_some(),
            EventCategory::System => self.system.is_some(),
        }
    }

    /// Invoke the one consumer method that owns `kind`.
    ///
    /// Returns `false` when no consumer is installed for the category.
    pub fn deliver(&self, kind: EventKind, payload: &Value) -> bool {
        let delivered = match kind {
            EventKind::ChatToken => self.chat.as_ref().map(|s| s.on_chat_token(payload)),
            EventKind::ChatResponse => self.chat.as_ref().map(|s| s.on_chat_response(payload)),
            EventKind::ChatStreamEnd => self.chat.as_ref().map(|s| s.on_chat_stream_end(payload)),
            EventKind::ChatStopped => self.chat.as_ref().map(|s| s.on_chat_stopped(payload)),
            EventKind::ConversationCleared => self
                .chat
                .as_ref()
                .map(|s| s.on_conversation_cleared(payload)),
            EventKind::TradeExecuted => self
                .trading
                .as_ref()
                .map(|s| s.on_trade_executed(payload)),
            EventKind::NewSignal => self.trading.as_ref().map(|s| s.on_new_signal(payload)),
            EventKind::BotStatus => self.trading.as_ref().map(|s| s.on_bot_status(payload)),
            EventKind::SimulationUpdate => self
                .trading
                .as_ref()
                .map(|s| s.on_simulation_update(payload)),
            EventKind::PortfolioUpdate => self
                .trading
                .as_ref()
                .map(|s| s.on_portfolio_update(payload)),
            EventKind::WalletUpdate => self.wallet.as_ref().map(|s| s.on_wallet_update(payload)),
            EventKind::BalanceUpdate => self.wallet.as_ref().map(|s| s.on_balance_update(payload)),
            EventKind::PriceUpdate => self.market.as_ref().map(|s| s.on_price_update(payload)),
            EventKind::NewsUpdate => self.market.as_ref().map(|s| s.on_news_update(payload)),
            EventKind::KnowledgeUpdate => self
                .knowledge
                .as_ref()
                .map(|s| s.on_knowledge_update(payload)),
            EventKind::EmbeddingProgress => self
                .knowledge
                .as_ref()
                .map(|s| s.on_embedding_progress(payload)),
            EventKind::Error => self.system.as_ref().map(|s| s.on_error(payload)),
            EventKind::DebugLog => self.system.as_ref().map(|s| s.on_debug_log(payload)),
            EventKind::Notification => self.system.as_ref().map(|s| s.on_notification(payload)),
            EventKind::ConnectionAck => self
                .system
                .as_ref()
                .map(|s| s.on_connection_ack(payload)),
        };

        if delivered.is_none() {
            trace!(event_type = %kind, "No consumer installed for route");
        }
        delivered.is_some()
    }
}

impl std::fmt::Debug for EventSinks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSinks")
            .field("chat", &self.chat.is_some())
            .field("trading", &self.trading.is_some())
            .field("wallet", &self.wallet.is_some())
            .field("market", &self.market.is_some())
            .field("knowledge", &self.knowledge.is_some())
            .field("system", &self.system.is_some())
            .finish()
    }
}
