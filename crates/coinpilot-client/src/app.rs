//! Application wiring and main loop.

use crate::config::AppConfig;
use crate::consumers::{LogConsumer, PriceAlertHandler, StatusIndicator};
use crate::error::AppResult;
use coinpilot_telemetry::SessionStatsReporter;
use coinpilot_ws::{
    ConnectionConfig, ConnectionManager, Connector, EventSinks, HttpPublicIpLookup, NoPublicIp,
    PublicIpLookup, TungsteniteConnector,
};
use serde_json::Value;
use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// How long shutdown waits for the channel to finish closing.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Lines buffered between the stdin thread and the main loop.
const INPUT_BUFFER: usize = 64;

/// Result of forwarding one input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    Sent,
    /// Valid JSON, but the channel refused it (not open or buffer full).
    Rejected,
    Invalid,
    Empty,
}

/// Main application.
pub struct Application {
    config: AppConfig,
    manager: Arc<ConnectionManager>,
    consumer: Arc<LogConsumer>,
    status: Arc<StatusIndicator>,
    alerts: Arc<PriceAlertHandler>,
}

impl Application {
    /// Create the application with the production transport.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        Self::with_connector(config, Arc::new(TungsteniteConnector::new()))
    }

    /// Create the application over an arbitrary transport.
    pub fn with_connector(config: AppConfig, connector: Arc<dyn Connector>) -> AppResult<Self> {
        let consumer = Arc::new(LogConsumer::new());
        let status = Arc::new(StatusIndicator::new());
        let alerts = Arc::new(PriceAlertHandler::new());

        let sinks = EventSinks::new()
            .with_chat(consumer.clone())
            .with_trading(consumer.clone())
            .with_wallet(consumer.clone())
            .with_market(consumer.clone())
            .with_knowledge(consumer.clone())
            .with_system(consumer.clone());

        let ip_lookup: Arc<dyn PublicIpLookup> = if config.public_ip.enabled {
            Arc::new(HttpPublicIpLookup::new(
                config.public_ip.url.clone(),
                Duration::from_millis(config.public_ip.timeout_ms),
            )?)
        } else {
            Arc::new(NoPublicIp)
        };

        let ws_config = ConnectionConfig::from(&config);
        let manager = ConnectionManager::new(ws_config, connector, sinks)?
            .with_status_observer(status.clone())
            .with_public_ip_lookup(ip_lookup);
        let manager = Arc::new(manager);
        manager.register_handler(alerts.clone());

        info!(
            client_id = %manager.client_id(),
            url = %manager.url(),
            "Application configured"
        );

        Ok(Self {
            config,
            manager,
            consumer,
            status,
            alerts,
        })
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    pub fn status(&self) -> &Arc<StatusIndicator> {
        &self.status
    }

    /// Forward one line of input to the channel if it is a JSON object.
    pub fn forward_line(&self, line: &str) -> LineOutcome {
        let line = line.trim();
        if line.is_empty() {
            return LineOutcome::Empty;
        }

        let value: Value = match serde_json::from_str(line) {
            Ok(value @ Value::Object(_)) => value,
            Ok(_) => {
                warn!("Input ignored: expected a JSON object");
                return LineOutcome::Invalid;
            }
            Err(e) => {
                warn!(error = %e, "Input ignored: not valid JSON");
                return LineOutcome::Invalid;
            }
        };

        if self.manager.send(&value) {
            debug!(event_type = ?value.get("type"), "Input forwarded");
            LineOutcome::Sent
        } else {
            warn!(state = %self.manager.state(), "Input not sent: channel not open");
            LineOutcome::Rejected
        }
    }

    /// Run with stdin as the input source.
    ///
    /// Stdin is read on a dedicated thread so a blocked read never holds up
    /// runtime shutdown.
    pub async fn run(self) -> AppResult<()> {
        self.run_with_lines(spawn_stdin_reader()).await
    }

    /// Run until the line source closes or Ctrl-C is received.
    pub async fn run_with_lines(self, mut lines: mpsc::Receiver<String>) -> AppResult<()> {
        info!("Starting application");
        let reporter = SessionStatsReporter::new();

        self.manager.connect();

        let mut stats_interval =
            tokio::time::interval(Duration::from_secs(self.config.telemetry.stats_interval_secs));
        let mut line_count = 0u64;

        loop {
            tokio::select! {
                line = lines.recv() => {
                    match line {
                        Some(line) => {
                            line_count += 1;
                            self.forward_line(&line);
                        }
                        None => {
                            info!("Input closed");
                            break;
                        }
                    }
                }

                _ = stats_interval.tick() => {
                    let stats = self.manager.stats();
                    info!(
                        state = %self.manager.state(),
                        connected = self.status.is_connected(),
                        messages = stats.messages_received,
                        reconnect_attempts = self.manager.reconnect_attempts(),
                        consumed = self.consumer.events(),
                        alerts = self.alerts.alerts(),
                        "Channel status"
                    );
                    reporter.output_summary();
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        info!(line_count, "Shutting down");
        self.manager.close();

        let stopped = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while self.manager.is_running() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        if stopped.is_err() {
            warn!("Channel did not close within the grace period");
        }

        info!("Final statistics summary:");
        reporter.output_summary();

        Ok(())
    }
}

/// Forward stdin lines from a plain OS thread.
///
/// The channel closes on EOF or a read error. The thread is detached, so a
/// read still blocked at exit does not keep the process alive.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(INPUT_BUFFER);

    let spawned = std::thread::Builder::new()
        .name("coinpilot-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Input read failed");
                        break;
                    }
                }
            }
        });
    if let Err(e) = spawned {
        warn!(error = %e, "Failed to start stdin reader");
    }

    rx
}
