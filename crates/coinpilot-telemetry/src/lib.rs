//! Prometheus counters and structured logging for the coinpilot client.
//!
//! - Structured logging with tracing (pretty in development, JSON in production)
//! - Process-wide counters for the event channel
//! - Periodic session summaries built from those counters

pub mod error;
pub mod logging;
pub mod metrics;
pub mod session_stats;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
pub use session_stats::{SessionStats, SessionStatsReporter};
