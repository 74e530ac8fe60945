// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Leif Rydenfalk – https://github.com/Leif-Rydenfalk/cell

use dendrite_core::{BoxFuture, Connector, Endpoint, LinkError, Wire};
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortBehavior {
    /// Handshake succeeds immediately.
    Accept,
    /// Fails immediately, like a closed port.
    Refuse,
    /// Never answers; only the attempt timeout ends it.
    Hang,
}

#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub host: String,
    pub port: u16,
    pub at: Instant,
}

/// Scripted in-memory backend. Ports without a behaviour refuse.
pub struct MockConnector {
    behaviors: Mutex<HashMap<u16, PortBehavior>>,
    attempts: Mutex<Vec<AttemptRecord>>,
    peers: mpsc::UnboundedSender<MockPeer>,
}

impl MockConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<MockPeer>) {
        let (peers, accepted) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            behaviors: Mutex::new(HashMap::new()),
            attempts: Mutex::new(Vec::new()),
            peers,
        });
        (connector, accepted)
    }

    pub fn set(&self, port: u16, behavior: PortBehavior) {
        self.behaviors.lock().unwrap().insert(port, behavior);
    }

    pub fn attempts(&self) -> Vec<AttemptRecord> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempted_ports(&self) -> Vec<u16> {
        self.attempts().iter().map(|a| a.port).collect()
    }
}

impl Connector for MockConnector {
    fn connect(&self, endpoint: Endpoint) -> BoxFuture<'static, Result<Wire, LinkError>> {
        let port = endpoint.port();
        self.attempts.lock().unwrap().push(AttemptRecord {
            host: endpoint.host().to_string(),
            port,
            at: Instant::now(),
        });

        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(&port)
            .copied()
            .unwrap_or(PortBehavior::Refuse);

        match behavior {
            PortBehavior::Accept => {
                let (client, server) = Wire::pair();
                let _ = self.peers.send(MockPeer { port, wire: server });
                Box::pin(async move { Ok(client) })
            }
            PortBehavior::Refuse => {
                Box::pin(async move { Err(LinkError::Refused(endpoint.to_string())) })
            }
            PortBehavior::Hang => Box::pin(std::future::pending::<Result<Wire, LinkError>>()),
        }
    }
}

/// The backend side of an accepted mock connection.
pub struct MockPeer {
    pub port: u16,
    wire: Wire,
}

impl MockPeer {
    /// Pushes a text frame to the client.
    pub fn push(&self, text: impl Into<String>) -> bool {
        self.wire.outbound.send(text.into()).is_ok()
    }

    /// Next frame the client sent; `None` once the client closed.
    pub async fn recv(&mut self) -> Option<String> {
        self.wire.inbound.recv().await
    }

    /// Hangs up, which the client sees as an unexpected close.
    pub fn close(self) {
        drop(self);
    }
}

/// Greeting sent by the echo backend; deliberately not JSON.
pub const ECHO_GREETING: &str = "dendrite echo ready";

/// A real WebSocket backend that greets, then echoes every text frame.
/// Aborting the returned handle drops every live connection.
pub async fn spawn_echo_backend() -> std::io::Result<(u16, JoinHandle<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();

    let server = tokio::spawn(async move {
        let mut connections = JoinSet::new();
        while let Ok((stream, _)) = listener.accept().await {
            connections.spawn(async move {
                let mut ws = match tokio_tungstenite::accept_async(stream).await {
                    Ok(ws) => ws,
                    Err(e) => {
                        debug!(error = %e, "[Echo] Handshake failed");
                        return;
                    }
                };
                if ws.send(Message::text(ECHO_GREETING)).await.is_err() {
                    return;
                }
                while let Some(Ok(msg)) = ws.next().await {
                    if msg.is_close() {
                        break;
                    }
                    if (msg.is_text() || msg.is_binary()) && ws.send(msg).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    Ok((port, server))
}

/// A port nothing is listening on (bound once, then released).
pub async fn unused_port() -> std::io::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}
