//! Transport abstraction over the underlying WebSocket.
//!
//! The connection manager only talks to these traits, so tests can swap in
//! the in-memory transport from [`crate::mock`].

use crate::error::{WsError, WsResult};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::pin::Pin;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async_tls_with_config, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Frame received from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncomingFrame {
    Text(String),
    Ping(Vec<u8>),
    Close { code: u16, reason: String },
    /// Binary, pong and other frames the channel ignores.
    Other,
}

/// Frame written to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutgoingFrame {
    Text(String),
    Pong(Vec<u8>),
    Close,
}

/// Write half of an open transport.
pub trait TransportWriter: Send {
    fn send(&mut self, frame: OutgoingFrame) -> BoxFuture<'_, WsResult<()>>;
}

/// Read half of an open transport. `None` means the stream ended.
pub trait TransportReader: Send {
    fn next_frame(&mut self) -> BoxFuture<'_, Option<WsResult<IncomingFrame>>>;
}

/// An open transport, split into halves.
pub struct Transport {
    pub writer: Box<dyn TransportWriter>,
    pub reader: Box<dyn TransportReader>,
}

/// Opens transports. Each call must create a fresh, independent transport.
pub trait Connector: Send + Sync {
    fn connect<'a>(&'a self, url: &'a str) -> BoxFuture<'a, WsResult<Transport>>;
}

// ============================================================================
// tokio-tungstenite implementation
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Production connector backed by tokio-tungstenite.
#[derive(Debug, Clone, Default)]
pub struct TungsteniteConnector;

impl TungsteniteConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for TungsteniteConnector {
    fn connect<'a>(&'a self, url: &'a str) -> BoxFuture<'a, WsResult<Transport>> {
        Box::pin(async move {
            info!(%url, "Opening WebSocket transport");

            // TCP_NODELAY: events are small and latency-sensitive
            let (ws_stream, _response) = connect_async_tls_with_config(url, None, true, None)
                .await
                .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;
            let (write, read) = ws_stream.split();

            Ok(Transport {
                writer: Box::new(TungsteniteWriter { inner: write }),
                reader: Box::new(TungsteniteReader { inner: read }),
            })
        })
    }
}

struct TungsteniteWriter {
    inner: SplitSink<WsStream, Message>,
}

impl TransportWriter for TungsteniteWriter {
    fn send(&mut self, frame: OutgoingFrame) -> BoxFuture<'_, WsResult<()>> {
        Box::pin(async move {
            let message = match frame {
                OutgoingFrame::Text(text) => Message::Text(text),
                OutgoingFrame::Pong(data) => Message::Pong(data),
                OutgoingFrame::Close => Message::Close(None),
            };
            self.inner.send(message).await?;
            Ok(())
        })
    }
}

struct TungsteniteReader {
    inner: SplitStream<WsStream>,
}

impl TransportReader for TungsteniteReader {
    fn next_frame(&mut self) -> BoxFuture<'_, Option<WsResult<IncomingFrame>>> {
        Box::pin(async move {
            let message = self.inner.next().await?;
            Some(message.map_err(WsError::from).map(|m| match m {
                Message::Text(text) => IncomingFrame::Text(text),
                Message::Ping(data) => IncomingFrame::Ping(data),
                Message::Close(frame) => {
                    let (code, reason) = frame
                        .map(|f| (f.code.into(), f.reason.to_string()))
                        .unwrap_or((1000, "Normal close".to_string()));
                    IncomingFrame::Close { code, reason }
                }
                other => {
                    debug!(?other, "Ignoring non-text frame");
                    IncomingFrame::Other
                }
            }))
        })
    }
}
