//! In-memory transport for tests.
//!
//! `MockConnector` hands out transports whose server side is a
//! [`MockSession`]. Dropping a session ends the client's read stream, which
//! the connection manager treats as a close.

use crate::error::{WsError, WsResult};
use crate::transport::{
    BoxFuture, Connector, IncomingFrame, OutgoingFrame, Transport, TransportReader,
    TransportWriter,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Connector producing in-memory transports.
#[derive(Debug)]
pub struct MockConnector {
    connect_calls: AtomicUsize,
    writes: Arc<AtomicUsize>,
    fail_next: AtomicU32,
    fail_all: AtomicBool,
    sessions_tx: mpsc::UnboundedSender<MockSession>,
}

/// Stream of server-side sessions, one per successful connect.
#[derive(Debug)]
pub struct MockSessions {
    rx: mpsc::UnboundedReceiver<MockSession>,
}

impl MockSessions {
    /// Wait for the next successful connect.
    pub async fn next(&mut self) -> Option<MockSession> {
        self.rx.recv().await
    }

    pub fn try_next(&mut self) -> Option<MockSession> {
        self.rx.try_recv().ok()
    }
}

impl MockConnector {
    pub fn new() -> (Arc<Self>, MockSessions) {
        let (sessions_tx, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            connect_calls: AtomicUsize::new(0),
            writes: Arc::new(AtomicUsize::new(0)),
            fail_next: AtomicU32::new(0),
            fail_all: AtomicBool::new(false),
            sessions_tx,
        });
        (connector, MockSessions { rx })
    }

    /// Fail the next `n` connect calls.
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Fail every connect call until switched off.
    pub fn fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Number of transport constructions attempted.
    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    /// Number of frames written across all transports.
    pub fn total_writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn should_fail(&self) -> bool {
        if self.fail_all.load(Ordering::SeqCst) {
            return true;
        }
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Connector for MockConnector {
    fn connect<'a>(&'a self, url: &'a str) -> BoxFuture<'a, WsResult<Transport>> {
        Box::pin(async move {
            self.connect_calls.fetch_add(1, Ordering::SeqCst);

            if self.should_fail() {
                return Err(WsError::ConnectionFailed(format!(
                    "mock refused connection to {url}"
                )));
            }

            let (frames_tx, frames_rx) = mpsc::unbounded_channel();
            let (written_tx, written_rx) = mpsc::unbounded_channel();

            let session = MockSession {
                url: url.to_string(),
                frames_tx,
                written_rx,
            };
            self.sessions_tx
                .send(session)
                .map_err(|_| WsError::ConnectionFailed("mock sessions dropped".to_string()))?;

            Ok(Transport {
                writer: Box::new(MockWriter {
                    tx: written_tx,
                    writes: self.writes.clone(),
                }),
                reader: Box::new(MockReader { rx: frames_rx }),
            })
        })
    }
}

struct MockWriter {
    tx: mpsc::UnboundedSender<OutgoingFrame>,
    writes: Arc<AtomicUsize>,
}

impl TransportWriter for MockWriter {
    fn send(&mut self, frame: OutgoingFrame) -> BoxFuture<'_, WsResult<()>> {
        Box::pin(async move {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.tx
                .send(frame)
                .map_err(|_| WsError::SendFailed("mock session dropped".to_string()))
        })
    }
}

struct MockReader {
    rx: mpsc::UnboundedReceiver<WsResult<IncomingFrame>>,
}

impl TransportReader for MockReader {
    fn next_frame(&mut self) -> BoxFuture<'_, Option<WsResult<IncomingFrame>>> {
        Box::pin(async move { self.rx.recv().await })
    }
}

/// Server side of one mock transport.
#[derive(Debug)]
pub struct MockSession {
    /// URL the client connected to.
    pub url: String,
    frames_tx: mpsc::UnboundedSender<WsResult<IncomingFrame>>,
    written_rx: mpsc::UnboundedReceiver<OutgoingFrame>,
}

impl MockSession {
    /// Deliver a text frame to the client.
    pub fn push_text(&self, text: impl Into<String>) -> bool {
        self.frames_tx
            .send(Ok(IncomingFrame::Text(text.into())))
            .is_ok()
    }

    /// Deliver a JSON value as a text frame.
    pub fn push_json(&self, value: &Value) -> bool {
        self.push_text(value.to_string())
    }

    pub fn push_ping(&self, data: Vec<u8>) -> bool {
        self.frames_tx.send(Ok(IncomingFrame::Ping(data))).is_ok()
    }

    /// Deliver a read error to the client.
    pub fn push_error(&self, message: &str) -> bool {
        self.frames_tx
            .send(Err(WsError::ConnectionFailed(message.to_string())))
            .is_ok()
    }

    /// Send a close frame.
    pub fn close(&self, code: u16, reason: &str) -> bool {
        self.frames_tx
            .send(Ok(IncomingFrame::Close {
                code,
                reason: reason.to_string(),
            }))
            .is_ok()
    }

    /// Next frame the client wrote, waiting for it.
    pub async fn next_written(&mut self) -> Option<OutgoingFrame> {
        self.written_rx.recv().await
    }

    /// Next text frame the client wrote, skipping pongs.
    pub async fn next_text(&mut self) -> Option<String> {
        loop {
            match self.written_rx.recv().await? {
                OutgoingFrame::Text(text) => return Some(text),
                OutgoingFrame::Pong(_) => continue,
                OutgoingFrame::Close => return None,
            }
        }
    }

    /// Next written frame if one is already queued.
    pub fn try_next_written(&mut self) -> Option<OutgoingFrame> {
        self.written_rx.try_recv().ok()
    }
}
