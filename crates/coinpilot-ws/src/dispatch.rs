//! Inbound event routing.
//!
//! Known tags go straight to their consumer method and never reach the
//! registry. Everything else is offered to the registry; whatever nobody
//! claims is logged and dropped.

use crate::message::{Event, EventKind};
use crate::registry::HandlerRegistry;
use crate::sink::EventSinks;
use coinpilot_telemetry::Metrics;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Where an inbound event ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Fixed route (delivered, or dropped if that consumer is absent).
    Routed(EventKind),
    /// Claimed by the registered handler at this index.
    Claimed(usize),
    /// Nothing claimed it.
    Unhandled,
}

/// Fixed dispatch table plus handler registry.
#[derive(Debug)]
pub struct Dispatcher {
    sinks: EventSinks,
    registry: Arc<HandlerRegistry>,
}

impl Dispatcher {
    pub fn new(sinks: EventSinks) -> Self {
        Self {
            sinks,
            registry: Arc::new(HandlerRegistry::new()),
        }
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Route one event. A consumer that panics is logged and counted; the
    /// panic does not reach the caller.
    pub fn dispatch(&self, event: &Event) -> DispatchOutcome {
        Metrics::event_received(&event.event_type);

        if let Some(kind) = event.kind() {
            let delivered = catch_unwind(AssertUnwindSafe(|| {
                self.sinks.deliver(kind, &event.payload)
            }));
            if delivered.is_err() {
                warn!(event_type = %kind, "Consumer panicked");
                Metrics::handler_failed();
            } else {
                trace!(event_type = %kind, "Routed to fixed consumer");
            }
            return DispatchOutcome::Routed(kind);
        }

        match self.registry.dispatch(event) {
            Some(index) => DispatchOutcome::Claimed(index),
            None => {
                debug!(event_type = %event.event_type, "Unhandled event discarded");
                Metrics::event_unhandled();
                DispatchOutcome::Unhandled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Handled, HandlerResult};
    use crate::sink::{
        ChatEventSink, KnowledgeEventSink, MarketEventSink, SystemEventSink, TradingEventSink,
        WalletEventSink,
    };
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records `method name` for every consumer call.
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<&'static str>>,
    }

    impl Recorder {
        fn record(&self, method: &'static str) {
            self.calls.lock().push(method);
        }

        fn take(&self) -> Vec<&'static str> {
            std::mem::take(&mut *self.calls.lock())
        }
    }

    impl ChatEventSink for Recorder {
        fn on_chat_token(&self, _: &Value) {
            self.record("on_chat_token")
        }
        fn on_chat_response(&self, _: &Value) {
            self.record("on_chat_response")
        }
        fn on_chat_stream_end(&self, _: &Value) {
            self.record("on_chat_stream_end")
        }
        fn on_chat_stopped(&self, _: &Value) {
            self.record("on_chat_stopped")
        }
        fn on_conversation_cleared(&self, _: &Value) {
            self.record("on_conversation_cleared")
        }
    }

    impl TradingEventSink for Recorder {
        fn on_trade_executed(&self, _: &Value) {
            self.record("on_trade_executed")
        }
        fn on_new_signal(&self, _: &Value) {
            self.record("on_new_signal")
        }
        fn on_bot_status(&self, _: &Value) {
            self.record("on_bot_status")
        }
        fn on_simulation_update(&self, _: &Value) {
            self.record("on_simulation_update")
        }
        fn on_portfolio_update(&self, _: &Value) {
            self.record("on_portfolio_update")
        }
    }

    impl WalletEventSink for Recorder {
        fn on_wallet_update(&self, _: &Value) {
            self.record("on_wallet_update")
        }
        fn on_balance_update(&self, _: &Value) {
            self.record("on_balance_update")
        }
    }

    impl MarketEventSink for Recorder {
        fn on_price_update(&self, _: &Value) {
            self.record("on_price_update")
        }
        fn on_news_update(&self, _: &Value) {
            self.record("on_news_update")
        }
    }

    impl KnowledgeEventSink for Recorder {
        fn on_knowledge_update(&self, _: &Value) {
            self.record("on_knowledge_update")
        }
        fn on_embedding_progress(&self, _: &Value) {
            self.record("on_embedding_progress")
        }
    }

    impl SystemEventSink for Recorder {
        fn on_error(&self, _: &Value) {
            self.record("on_error")
        }
        fn on_debug_log(&self, _: &Value) {
            self.record("on_debug_log")
        }
        fn on_notification(&self, _: &Value) {
            self.record("on_notification")
        }
        fn on_connection_ack(&self, _: &Value) {
            self.record("on_connection_ack")
        }
    }

    fn full_dispatcher() -> (Arc<Recorder>, Dispatcher) {
        let recorder = Arc::new(Recorder::default());
        let sinks = EventSinks::new()
            .with_chat(recorder.clone())
            .with_trading(recorder.clone())
            .with_wallet(recorder.clone())
            .with_market(recorder.clone())
            .with_knowledge(recorder.clone())
            .with_system(recorder.clone());
        (recorder, Dispatcher::new(sinks))
    }

    fn expected_method(kind: EventKind) -> &'static str {
        match kind {
            EventKind::ChatToken => "on_chat_token",
            EventKind::ChatResponse => "on_chat_response",
            EventKind::ChatStreamEnd => "on_chat_stream_end",
            EventKind::ChatStopped => "on_chat_stopped",
            EventKind::ConversationCleared => "on_conversation_cleared",
            EventKind::TradeExecuted => "on_trade_executed",
            EventKind::NewSignal => "on_new_signal",
            EventKind::BotStatus => "on_bot_status",
            EventKind::SimulationUpdate => "on_simulation_update",
            EventKind::PortfolioUpdate => "on_portfolio_update",
            EventKind::WalletUpdate => "on_wallet_update",
            EventKind::BalanceUpdate => "on_balance_update",
            EventKind::PriceUpdate => "on_price_update",
            EventKind::NewsUpdate => "on_news_update",
            EventKind::KnowledgeUpdate => "on_knowledge_update",
            EventKind::EmbeddingProgress => "on_embedding_progress",
            EventKind::Error => "on_error",
            EventKind::DebugLog => "on_debug_log",
            EventKind::Notification => "on_notification",
            EventKind::ConnectionAck => "on_connection_ack",
        }
    }

    #[test]
    fn test_each_known_tag_reaches_exactly_one_method() {
        let (recorder, dispatcher) = full_dispatcher();

        for kind in EventKind::ALL {
            let event = Event::new(kind.as_str(), json!({"n": 1}));
            assert_eq!(dispatcher.dispatch(&event), DispatchOutcome::Routed(kind));
            assert_eq!(recorder.take(), vec![expected_method(kind)], "tag {kind}");
        }
    }

    #[test]
    fn test_known_tags_bypass_registry() {
        let (recorder, dispatcher) = full_dispatcher();
        let consulted = Arc::new(AtomicUsize::new(0));
        let consulted_clone = consulted.clone();
        dispatcher
            .registry()
            .register(Arc::new(move |_: &Event| -> HandlerResult {
                consulted_clone.fetch_add(1, Ordering::SeqCst);
                Ok(Handled::Yes)
            }));

        let event = Event::new("price_update", json!({"bitcoin": {"usd": 65000}}));
        assert_eq!(
            dispatcher.dispatch(&event),
            DispatchOutcome::Routed(EventKind::PriceUpdate)
        );
        assert_eq!(recorder.take(), vec!["on_price_update"]);
        assert_eq!(consulted.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unknown_tag_falls_through_to_registry() {
        let (recorder, dispatcher) = full_dispatcher();
        dispatcher
            .registry()
            .register(Arc::new(|e: &Event| -> HandlerResult {
                Ok((e.event_type == "price_alert").into())
            }));

        let alert = Event::new("price_alert", json!({"symbol": "BTC"}));
        assert_eq!(dispatcher.dispatch(&alert), DispatchOutcome::Claimed(0));

        let other = Event::new("mystery", Value::Null);
        assert_eq!(dispatcher.dispatch(&other), DispatchOutcome::Unhandled);
        assert!(recorder.take().is_empty());
    }

    #[test]
    fn test_known_tag_without_consumer_is_still_routed() {
        let dispatcher = Dispatcher::new(EventSinks::new());
        let event = Event::new("wallet_update", Value::Null);
        assert_eq!(
            dispatcher.dispatch(&event),
            DispatchOutcome::Routed(EventKind::WalletUpdate)
        );
    }

    struct PanickingMarket;

    impl MarketEventSink for PanickingMarket {
        fn on_price_update(&self, _: &Value) {
            panic!("chart widget bug")
        }
        fn on_news_update(&self, _: &Value) {}
    }

    #[test]
    fn test_panicking_consumer_is_contained() {
        let dispatcher = Dispatcher::new(EventSinks::new().with_market(Arc::new(PanickingMarket)));

        let event = Event::new("price_update", json!({"bitcoin": {"usd": 65000}}));
        assert_eq!(
            dispatcher.dispatch(&event),
            DispatchOutcome::Routed(EventKind::PriceUpdate)
        );
        let news = Event::new("news_update", json!([]));
        assert_eq!(
            dispatcher.dispatch(&news),
            DispatchOutcome::Routed(EventKind::NewsUpdate)
        );
    }
}
