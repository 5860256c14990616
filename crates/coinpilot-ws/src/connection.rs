//! Event channel connection manager.
//!
//! Owns the single transport for the process, routes inbound events and
//! recovers the channel with bounded linear backoff.
//!
//! Lifecycle: `connect()` spawns a driver task that opens the transport,
//! runs the session loop until the transport closes, then either schedules a
//! reconnect or gives up once the attempt bound is exhausted. At most one
//! driver (and so one transport) exists at a time.

use crate::backoff::ReconnectPolicy;
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::endpoint::{transport_url, ClientId};
use crate::error::WsResult;
use crate::message::{Event, OutboundEvent};
use crate::public_ip::{NoPublicIp, PublicIpLookup};
use crate::registry::EventHandler;
use crate::sink::EventSinks;
use crate::state::ChannelState;
use crate::status::{ConnectionStatus, NoopStatusObserver, StatusObserver};
use crate::transport::{Connector, IncomingFrame, OutgoingFrame, Transport};
use crate::write_handle::EventSender;
use chrono::{DateTime, Utc};
use coinpilot_telemetry::Metrics;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex as TokioMutex, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Origin of the hosting dashboard, e.g. `https://dash.example.com`.
    pub origin: String,
    /// Fixed client id. Generated when `None`.
    pub client_id: Option<String>,
    /// Reconnect attempts before giving up.
    pub max_reconnect_attempts: u32,
    /// Base delay for linear backoff.
    pub reconnect_base_delay_ms: u64,
    /// Capacity of the outbound write buffer.
    pub outbound_buffer: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8000".to_string(),
            client_id: None,
            max_reconnect_attempts: crate::backoff::DEFAULT_MAX_ATTEMPTS,
            reconnect_base_delay_ms: crate::backoff::DEFAULT_BASE_DELAY_MS,
            outbound_buffer: 256,
        }
    }
}

impl ConnectionConfig {
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            Duration::from_millis(self.reconnect_base_delay_ms),
            self.max_reconnect_attempts,
        )
    }
}

/// Channel statistics.
#[derive(Debug, Clone, Default)]
pub struct ConnectionStats {
    /// When the current session opened. `None` while not open.
    pub connected_at: Option<DateTime<Utc>>,
    /// Last inbound text frame.
    pub last_message_at: Option<DateTime<Utc>>,
    pub messages_received: u64,
    pub parse_failures: u64,
    pub unhandled: u64,
    pub reconnects: u64,
    pub sessions_opened: u64,
}

/// Driver bookkeeping, guarded by one lock.
///
/// Lock order: `control` before `state`.
struct Control {
    reconnect_attempts: u32,
    driver_active: bool,
    wake_requested: bool,
    session_token: CancellationToken,
}

/// Event channel connection manager.
pub struct ConnectionManager {
    client_id: ClientId,
    url: String,
    policy: ReconnectPolicy,
    connector: Arc<dyn Connector>,
    dispatcher: Dispatcher,
    status_observer: Arc<dyn StatusObserver>,
    ip_lookup: Arc<dyn PublicIpLookup>,
    state: Arc<RwLock<ChannelState>>,
    state_tx: watch::Sender<ChannelState>,
    control: Mutex<Control>,
    retry_now: Notify,
    /// Bumped on every open; a hello is only sent on the session it was built for.
    session_generation: AtomicU64,
    outbound_tx: mpsc::Sender<String>,
    outbound_rx: TokioMutex<mpsc::Receiver<String>>,
    stats: RwLock<ConnectionStats>,
}

impl ConnectionManager {
    /// Create a connection manager. Fails if the origin cannot be mapped to
    /// a channel URL.
    pub fn new(
        config: ConnectionConfig,
        connector: Arc<dyn Connector>,
        sinks: EventSinks,
    ) -> WsResult<Self> {
        let client_id = config
            .client_id
            .clone()
            .map(ClientId::from)
            .unwrap_or_else(ClientId::generate);
        let url = transport_url(&config.origin, &client_id)?;
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_buffer.max(1));
        let (state_tx, _) = watch::channel(ChannelState::Idle);

        info!(client_id = %client_id, %url, "Connection manager created");

        Ok(Self {
            client_id,
            url,
            policy: config.reconnect_policy(),
            connector,
            dispatcher: Dispatcher::new(sinks),
            status_observer: Arc::new(NoopStatusObserver),
            ip_lookup: Arc::new(NoPublicIp),
            state: Arc::new(RwLock::new(ChannelState::Idle)),
            state_tx,
            control: Mutex::new(Control {
                reconnect_attempts: 0,
                driver_active: false,
                wake_requested: false,
                session_token: CancellationToken::new(),
            }),
            retry_now: Notify::new(),
            session_generation: AtomicU64::new(0),
            outbound_tx,
            outbound_rx: TokioMutex::new(outbound_rx),
            stats: RwLock::new(ConnectionStats::default()),
        })
    }

    /// Install the status observer.
    #[must_use]
    pub fn with_status_observer(mut self, observer: Arc<dyn StatusObserver>) -> Self {
        self.status_observer = observer;
        self
    }

    /// Install the public address lookup used for the hello.
    #[must_use]
    pub fn with_public_ip_lookup(mut self, lookup: Arc<dyn PublicIpLookup>) -> Self {
        self.ip_lookup = lookup;
        self
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Channel URL derived from the origin.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> ChannelState {
        *self.state.read()
    }

    /// Watch state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ChannelState> {
        self.state_tx.subscribe()
    }

    /// Consecutive failed attempts since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.control.lock().reconnect_attempts
    }

    /// Whether a driver task is alive (connecting, open, or waiting to reconnect).
    pub fn is_running(&self) -> bool {
        self.control.lock().driver_active
    }

    pub fn stats(&self) -> ConnectionStats {
        self.stats.read().clone()
    }

    /// Cloneable send handle for consumers.
    pub fn sender(&self) -> EventSender {
        EventSender::new(self.outbound_tx.clone(), self.state.clone())
    }

    /// Register a handler for events outside the fixed table.
    pub fn register_handler(&self, handler: Arc<dyn EventHandler>) {
        self.dispatcher.registry().register(handler);
    }

    /// Serialize and write an event if the channel is open.
    ///
    /// Returns `false` without writing when the channel is not open. Events
    /// are never queued for a later connection.
    pub fn send<T: Serialize>(&self, event: &T) -> bool {
        self.sender().send(event)
    }

    /// Open the channel.
    ///
    /// No-op (returns `false`) while connecting or open. While a reconnect is
    /// pending, wakes it immediately instead of opening a second transport.
    pub fn connect(self: &Arc<Self>) -> bool {
        let mut control = self.control.lock();

        let current = self.state();
        if current.is_active() {
            debug!(state = %current, "connect() ignored: channel already active");
            return false;
        }

        if control.driver_active {
            if control.session_token.is_cancelled() {
                warn!("connect() ignored: close in progress");
                return false;
            }
            debug!("connect() wakes pending reconnect");
            control.wake_requested = true;
            self.retry_now.notify_waiters();
            return true;
        }

        if !self.transition(ChannelState::Connecting) {
            return false;
        }
        if control.session_token.is_cancelled() {
            control.session_token = CancellationToken::new();
        }
        control.driver_active = true;
        control.wake_requested = false;
        let token = control.session_token.clone();
        drop(control);

        let this = Arc::clone(self);
        tokio::spawn(async move { this.run(token).await });
        true
    }

    /// Tear the channel down and suppress further reconnection.
    ///
    /// Sets the attempt counter to its bound and closes the transport. A
    /// later `connect()` may still open a new channel.
    pub fn close(&self) {
        let mut control = self.control.lock();
        control.reconnect_attempts = self.policy.max_attempts;
        control.wake_requested = false;
        control.session_token.cancel();
        info!(client_id = %self.client_id, "Channel close requested");
    }

    // ------------------------------------------------------------------------
    // Driver
    // ------------------------------------------------------------------------

    async fn run(self: Arc<Self>, token: CancellationToken) {
        loop {
            let opened = tokio::select! {
                result = self.connector.connect(&self.url) => result,
                () = token.cancelled() => {
                    info!("Close requested while connecting");
                    self.on_close();
                    break;
                }
            };

            let reason = match opened {
                Ok(transport) => {
                    // Events queued for a previous session are not carried over.
                    let mut outbound_rx = self.outbound_rx.lock().await;
                    let mut discarded = 0usize;
                    while outbound_rx.try_recv().is_ok() {
                        discarded += 1;
                    }
                    if discarded > 0 {
                        debug!(discarded, "Discarded stale outbound events");
                    }

                    self.on_open();
                    self.run_session(transport, &mut outbound_rx, &token).await
                }
                Err(e) => {
                    warn!(error = %e, url = %self.url, "Transport could not be opened");
                    "connect_failed"
                }
            };

            self.on_close();

            if token.is_cancelled() {
                break;
            }

            // Register for wake-ups before inspecting the flag so none is lost.
            let notified = self.retry_now.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let delay = {
                let mut control = self.control.lock();
                if control.wake_requested {
                    control.wake_requested = false;
                    Duration::ZERO
                } else {
                    match self.policy.next_attempt(control.reconnect_attempts) {
                        Some((attempt, delay)) => {
                            control.reconnect_attempts = attempt;
                            self.stats.write().reconnects += 1;
                            Metrics::ws_reconnect(reason);
                            warn!(
                                attempt,
                                max_attempts = self.policy.max_attempts,
                                delay_ms = delay.as_millis() as u64,
                                reason,
                                "Reconnecting"
                            );
                            delay
                        }
                        None => {
                            error!(
                                attempts = control.reconnect_attempts,
                                "Reconnect attempts exhausted, channel stays closed"
                            );
                            control.driver_active = false;
                            return;
                        }
                    }
                }
            };

            if !delay.is_zero() {
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = &mut notified => {
                        debug!("Reconnect delay cut short by connect()");
                    }
                    () = token.cancelled() => {
                        info!("Close requested during reconnect delay");
                        break;
                    }
                }
            }

            let mut control = self.control.lock();
            control.wake_requested = false;
            if token.is_cancelled() || !self.transition(ChannelState::Connecting) {
                break;
            }
        }

        self.control.lock().driver_active = false;
    }

    fn on_open(self: &Arc<Self>) {
        {
            let mut control = self.control.lock();
            control.reconnect_attempts = 0;
            self.transition(ChannelState::Open);
        }
        let generation = self.session_generation.fetch_add(1, Ordering::SeqCst) + 1;

        {
            let mut stats = self.stats.write();
            stats.connected_at = Some(Utc::now());
            stats.sessions_opened += 1;
        }
        Metrics::ws_connected();
        info!(client_id = %self.client_id, "Channel open");
        self.status_observer.on_status(ConnectionStatus::Connected);

        self.spawn_hello(generation);
    }

    fn on_close(&self) {
        let previous = self.state();
        if previous != ChannelState::Closed {
            self.transition(ChannelState::Closed);
        }
        self.stats.write().connected_at = None;
        Metrics::ws_disconnected();
        info!(previous = %previous, "Channel closed");
        self.status_observer.on_status(ConnectionStatus::Disconnected);
    }

    /// Send the hello once the best-effort address lookup finishes.
    fn spawn_hello(self: &Arc<Self>, generation: u64) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let public_ip = this.ip_lookup.lookup().await;

            if this.session_generation.load(Ordering::SeqCst) != generation {
                debug!("Session changed during address lookup, hello skipped");
                return;
            }

            let has_ip = public_ip.is_some();
            let hello = OutboundEvent::client_connected(this.client_id.as_str(), public_ip);
            if this.send(&hello) {
                debug!(client_id = %this.client_id, has_ip, "Hello sent");
            } else {
                warn!("Hello not sent: channel closed before it could be written");
            }
        });
    }

    /// Run one session until the transport closes or a close is requested.
    ///
    /// Returns the reason label used for reconnect metrics.
    async fn run_session(
        &self,
        transport: Transport,
        outbound_rx: &mut mpsc::Receiver<String>,
        token: &CancellationToken,
    ) -> &'static str {
        let Transport {
            mut writer,
            mut reader,
        } = transport;

        loop {
            tokio::select! {
                biased;

                () = token.cancelled() => {
                    info!("Close requested, sending Close frame");
                    if let Err(e) = writer.send(OutgoingFrame::Close).await {
                        warn!(error = %e, "Failed to send Close frame");
                    }
                    return "shutdown";
                }

                frame = reader.next_frame() => {
                    match frame {
                        Some(Ok(IncomingFrame::Text(text))) => {
                            self.handle_text(&text);
                        }
                        Some(Ok(IncomingFrame::Ping(data))) => {
                            debug!("Received ping, sending pong");
                            if let Err(e) = writer.send(OutgoingFrame::Pong(data)).await {
                                error!(error = %e, "Failed to send pong");
                                return "write_failed";
                            }
                        }
                        Some(Ok(IncomingFrame::Close { code, reason })) => {
                            warn!(code, %reason, "Channel closed by server");
                            return "closed";
                        }
                        Some(Ok(IncomingFrame::Other)) => {}
                        Some(Err(e)) => {
                            error!(error = %e, "Transport read error");
                            return "error";
                        }
                        None => {
                            warn!("Transport stream ended");
                            return "closed";
                        }
                    }
                }

                outbound = outbound_rx.recv() => {
                    match outbound {
                        Some(text) => {
                            if let Err(e) = writer.send(OutgoingFrame::Text(text)).await {
                                error!(error = %e, "Transport write failed");
                                return "write_failed";
                            }
                        }
                        None => return "closed",
                    }
                }
            }
        }
    }

    /// Parse and route one inbound frame. Never fails the session.
    fn handle_text(&self, text: &str) {
        {
            let mut stats = self.stats.write();
            stats.messages_received += 1;
            stats.last_message_at = Some(Utc::now());
        }

        let event = match Event::parse(text) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, len = text.len(), "Dropping malformed inbound frame");
                Metrics::event_parse_failed();
                self.stats.write().parse_failures += 1;
                return;
            }
        };

        if self.dispatcher.dispatch(&event) == DispatchOutcome::Unhandled {
            self.stats.write().unhandled += 1;
        }
    }

    fn transition(&self, next: ChannelState) -> bool {
        let mut state = self.state.write();
        if !state.can_transition_to(next) {
            warn!(from = %*state, to = %next, "Refusing illegal channel transition");
            return false;
        }
        debug!(from = %*state, to = %next, "Channel state change");
        *state = next;
        self.state_tx.send_replace(next);
        true
    }
}
