//! coinpilot event channel client.
//!
//! Wires the connection manager to logging consumers:
//! - TOML configuration with CLI overrides
//! - Category consumers that log every routed event
//! - A handler for custom `price_alert` events
//! - Line-delimited JSON from stdin forwarded to the backend

pub mod app;
pub mod config;
pub mod consumers;
pub mod error;

pub use app::{Application, LineOutcome};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
