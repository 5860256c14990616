//! Event channel client for the coinpilot dashboard backend.
//!
//! Provides a single persistent WebSocket connection with:
//! - Idempotent connect and an explicit Idle/Connecting/Open/Closed state machine
//! - Bounded linear reconnect (2s, 4s, 6s, ... up to 5 attempts)
//! - Fixed routing of known event tags to category consumers
//! - First-match handler registry for custom event tags
//! - Best-effort hello carrying the client id and public address

pub mod backoff;
pub mod connection;
pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod message;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod public_ip;
pub mod registry;
pub mod sink;
pub mod state;
pub mod status;
pub mod transport;
pub mod write_handle;

pub use backoff::ReconnectPolicy;
pub use connection::{ConnectionConfig, ConnectionManager, ConnectionStats};
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use endpoint::{transport_url, ClientId};
pub use error::{WsError, WsResult};
pub use message::{Event, EventCategory, EventKind, OutboundEvent};
pub use public_ip::{HttpPublicIpLookup, NoPublicIp, PublicIpLookup, StaticPublicIp};
pub use registry::{EventHandler, Handled, HandlerError, HandlerRegistry, HandlerResult};
pub use sink::{
    ChatEventSink, EventSinks, KnowledgeEventSink, MarketEventSink, SystemEventSink,
    TradingEventSink, WalletEventSink,
};
pub use state::ChannelState;
pub use status::{ConnectionStatus, NoopStatusObserver, StatusObserver};
pub use transport::{
    BoxFuture, Connector, IncomingFrame, OutgoingFrame, Transport, TransportReader,
    TransportWriter, TungsteniteConnector,
};
pub use write_handle::EventSender;

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any `wss://` connection is made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
