//! Prometheus metrics for the event channel.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration failure
//! means duplicate metric names, which is a programming error that should
//! surface at first use rather than be silently ignored.

use crate::error::{TelemetryError, TelemetryResult};
use once_cell::sync::Lazy;
use prometheus::core::Collector;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, Counter, CounterVec, Encoder, Gauge,
    TextEncoder,
};

/// Channel state (1 = open, 0 = not open).
pub static WS_CONNECTED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("coinpilot_ws_connected", "Event channel state (1=open)").unwrap()
});

/// Total reconnection attempts.
/// Labels: reason (connect_failed/closed)
pub static WS_RECONNECT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "coinpilot_ws_reconnect_total",
        "Total event channel reconnection attempts",
        &["reason"]
    )
    .unwrap()
});

/// Inbound events that parsed successfully.
pub static EVENTS_RECEIVED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "coinpilot_events_received_total",
        "Total inbound events by type tag",
        &["type"]
    )
    .unwrap()
});

/// Inbound events no route or handler claimed.
pub static EVENTS_UNHANDLED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "coinpilot_events_unhandled_total",
        "Inbound events discarded because nothing claimed them"
    )
    .unwrap()
});

/// Inbound frames that were not valid events.
pub static EVENT_PARSE_FAILURES_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "coinpilot_event_parse_failures_total",
        "Inbound frames dropped because they did not parse"
    )
    .unwrap()
});

/// Registered handlers that returned an error or panicked.
pub static HANDLER_FAILURES_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "coinpilot_handler_failures_total",
        "Registered handler invocations that failed"
    )
    .unwrap()
});

/// Outbound events accepted for writing.
pub static EVENTS_SENT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "coinpilot_events_sent_total",
        "Outbound events queued for the transport",
        &["type"]
    )
    .unwrap()
});

/// Outbound events refused by send.
/// Labels: reason (not_open/buffer_full/serialize)
pub static SEND_REJECTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "coinpilot_send_rejected_total",
        "Outbound events refused by send",
        &["reason"]
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record channel open.
    pub fn ws_connected() {
        WS_CONNECTED.set(1.0);
    }

    /// Record channel closed.
    pub fn ws_disconnected() {
        WS_CONNECTED.set(0.0);
    }

    /// Record a scheduled reconnection.
    pub fn ws_reconnect(reason: &str) {
        WS_RECONNECT_TOTAL.with_label_values(&[reason]).inc();
    }

    /// Record a parsed inbound event.
    pub fn event_received(event_type: &str) {
        EVENTS_RECEIVED_TOTAL.with_label_values(&[event_type]).inc();
    }

    /// Record an inbound event nothing claimed.
    pub fn event_unhandled() {
        EVENTS_UNHANDLED_TOTAL.inc();
    }

    /// Record an inbound frame that failed to parse.
    pub fn event_parse_failed() {
        EVENT_PARSE_FAILURES_TOTAL.inc();
    }

    /// Record a failed handler invocation.
    pub fn handler_failed() {
        HANDLER_FAILURES_TOTAL.inc();
    }

    /// Record an outbound event queued for writing.
    pub fn event_sent(event_type: &str) {
        EVENTS_SENT_TOTAL.with_label_values(&[event_type]).inc();
    }

    /// Record an outbound event refused by send.
    pub fn send_rejected(reason: &str) {
        SEND_REJECTED_TOTAL.with_label_values(&[reason]).inc();
    }

    /// Sum of a labelled counter across all label values.
    pub fn counter_vec_total(counter: &CounterVec) -> u64 {
        counter
            .collect()
            .iter()
            .flat_map(|mf| mf.get_metric().iter())
            .map(|m| m.get_counter().get_value())
            .sum::<f64>() as u64
    }

    /// Render the default registry in the Prometheus text format.
    pub fn gather_text() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let families = prometheus::gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&families, &mut buffer)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}
