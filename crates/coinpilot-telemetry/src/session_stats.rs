//! Periodic session summary built from the channel counters.

use crate::metrics::{
    Metrics, EVENTS_RECEIVED_TOTAL, EVENTS_SENT_TOTAL, EVENTS_UNHANDLED_TOTAL,
    EVENT_PARSE_FAILURES_TOTAL, HANDLER_FAILURES_TOTAL, SEND_REJECTED_TOTAL, WS_CONNECTED,
    WS_RECONNECT_TOTAL,
};
use chrono::{DateTime, Utc};
use tracing::info;

/// Counter snapshot for one reporting period.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub received: u64,
    pub unhandled: u64,
    pub parse_failures: u64,
    pub handler_failures: u64,
    pub sent: u64,
    pub send_rejected: u64,
    pub reconnects: u64,
    pub connected: bool,
}

/// Session statistics reporter.
///
/// Counters are process-wide, so the reporter remembers the values at its
/// creation and reports deltas since then.
pub struct SessionStatsReporter {
    start_time: DateTime<Utc>,
    baseline: SessionStats,
}

impl Default for SessionStatsReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStatsReporter {
    /// Create a reporter whose period starts now.
    pub fn new() -> Self {
        Self {
            start_time: Utc::now(),
            baseline: Self::read_counters(),
        }
    }

    fn read_counters() -> SessionStats {
        SessionStats {
            received: Metrics::counter_vec_total(&EVENTS_RECEIVED_TOTAL),
            unhandled: EVENTS_UNHANDLED_TOTAL.get() as u64,
            parse_failures: EVENT_PARSE_FAILURES_TOTAL.get() as u64,
            handler_failures: HANDLER_FAILURES_TOTAL.get() as u64,
            sent: Metrics::counter_vec_total(&EVENTS_SENT_TOTAL),
            send_rejected: Metrics::counter_vec_total(&SEND_REJECTED_TOTAL),
            reconnects: Metrics::counter_vec_total(&WS_RECONNECT_TOTAL),
            connected: WS_CONNECTED.get() > 0.0,
        }
    }

    /// Counter deltas since the reporter was created.
    pub fn get_stats(&self) -> SessionStats {
        let now = Self::read_counters();
        SessionStats {
            received: now.received.saturating_sub(self.baseline.received),
            unhandled: now.unhandled.saturating_sub(self.baseline.unhandled),
            parse_failures: now
                .parse_failures
                .saturating_sub(self.baseline.parse_failures),
            handler_failures: now
                .handler_failures
                .saturating_sub(self.baseline.handler_failures),
            sent: now.sent.saturating_sub(self.baseline.sent),
            send_rejected: now.send_rejected.saturating_sub(self.baseline.send_rejected),
            reconnects: now.reconnects.saturating_sub(self.baseline.reconnects),
            connected: now.connected,
        }
    }

    /// Log a one-line summary of the session so far.
    pub fn output_summary(&self) {
        let stats = self.get_stats();
        let uptime = Utc::now() - self.start_time;

        info!(
            since = %self.start_time.format("%Y-%m-%d %H:%M:%S UTC"),
            uptime_secs = uptime.num_seconds(),
            connected = stats.connected,
            received = stats.received,
            unhandled = stats.unhandled,
            parse_failures = stats.parse_failures,
            handler_failures = stats.handler_failures,
            sent = stats.sent,
            send_rejected = stats.send_rejected,
            reconnects = stats.reconnects,
            "Session statistics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_are_deltas_from_creation() {
        Metrics::event_parse_failed();
        let reporter = SessionStatsReporter::new();
        let initial = reporter.get_stats();
        assert_eq!(initial.parse_failures, 0);

        Metrics::event_parse_failed();
        Metrics::event_sent("client_connected");

        let stats = reporter.get_stats();
        assert!(stats.parse_failures >= 1);
        assert!(stats.sent >= 1);
    }
}
