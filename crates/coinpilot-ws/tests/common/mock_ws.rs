//! Mock dashboard backend for integration tests.
//!
//! Accepts channel connections, records the request path and every text
//! frame received, and answers the hello with a scripted list of events.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::{accept_hdr_async, tungstenite::Message};

#[derive(Default)]
struct Recorded {
    paths: Vec<String>,
    messages: Vec<String>,
}

#[derive(Clone)]
struct Behaviour {
    /// Frames sent once the client's hello arrives.
    after_hello: Vec<String>,
    /// Close the connection after replying to the hello.
    close_after_hello: bool,
}

/// A mock backend server.
pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    recorded: Arc<Mutex<Recorded>>,
}

impl MockWsServer {
    /// Start a server that answers the hello with `after_hello`.
    pub async fn start(after_hello: Vec<String>) -> Self {
        Self::start_with(after_hello, false).await
    }

    /// Start a server that replies to the hello and then closes.
    pub async fn start_closing(after_hello: Vec<String>) -> Self {
        Self::start_with(after_hello, true).await
    }

    async fn start_with(after_hello: Vec<String>, close_after_hello: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let behaviour = Behaviour {
            after_hello,
            close_after_hello,
        };

        let recorded_clone = recorded.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        tokio::spawn(handle_connection(
                            stream,
                            recorded_clone.clone(),
                            behaviour.clone(),
                        ));
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            recorded,
        }
    }

    /// Origin the client should be configured with.
    pub fn origin(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of completed handshakes.
    pub async fn connection_count(&self) -> usize {
        self.recorded.lock().await.paths.len()
    }

    /// Request paths, one per handshake.
    pub async fn paths(&self) -> Vec<String> {
        self.recorded.lock().await.paths.clone()
    }

    /// All text frames received, across connections.
    pub async fn received_messages(&self) -> Vec<String> {
        self.recorded.lock().await.messages.clone()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn handle_connection(stream: TcpStream, recorded: Arc<Mutex<Recorded>>, behaviour: Behaviour) {
    let mut path = String::new();
    let record_path = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        path = request.uri().path().to_string();
        Ok(response)
    };
    let ws_stream = match accept_hdr_async(stream, record_path).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };
    recorded.lock().await.paths.push(path);

    let (mut write, mut read) = ws_stream.split();

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                recorded.lock().await.messages.push(text.clone());

                let is_hello = serde_json::from_str::<serde_json::Value>(&text)
                    .ok()
                    .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(str::to_string))
                    .as_deref()
                    == Some("client_connected");

                if is_hello {
                    for frame in &behaviour.after_hello {
                        let _ = write.send(Message::Text(frame.clone())).await;
                    }
                    if behaviour.close_after_hello {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            Ok(Message::Ping(data)) => {
                let _ = write.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => break,
            Err(_) => break,
            _ => {}
        }
    }
}
