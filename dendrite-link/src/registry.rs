// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Leif Rydenfalk – https://github.com/Leif-Rydenfalk/cell

use crate::supervisor::Event;
use dendrite_core::{SendError, Wire};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, trace};

/// An established connection. Owned by the registry from handshake to close.
pub(crate) struct SocketHandle {
    port: u16,
    socket: u64,
    outbound: mpsc::UnboundedSender<String>,
    reader: AbortHandle,
}

impl SocketHandle {
    /// Takes ownership of a fresh wire and starts pumping its inbound frames
    /// into the supervisor, finishing with `Event::Closed`.
    pub fn adopt(port: u16, socket: u64, wire: Wire, events: &mpsc::UnboundedSender<Event>) -> Self {
        let Wire {
            outbound,
            mut inbound,
        } = wire;

        let tx = events.clone();
        let reader = tokio::spawn(async move {
            while let Some(text) = inbound.recv().await {
                if tx.send(Event::Frame { port, socket, text }).is_err() {
                    return;
                }
            }
            let _ = tx.send(Event::Closed { port, socket });
        })
        .abort_handle();

        Self {
            port,
            socket,
            outbound,
            reader,
        }
    }

    pub fn is_open(&self) -> bool {
        !self.outbound.is_closed()
    }
}

impl Drop for SocketHandle {
    // Dropping `outbound` closes the socket; the reader must not report it.
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Open connections keyed by port. Iteration order is ascending port.
#[derive(Default)]
pub(crate) struct SocketRegistry {
    sockets: BTreeMap<u16, SocketHandle>,
}

impl SocketRegistry {
    pub fn register(&mut self, handle: SocketHandle) {
        debug!(port = handle.port, socket = handle.socket, "[Registry] Registered");
        if let Some(previous) = self.sockets.insert(handle.port, handle) {
            debug!(port = previous.port, "[Registry] Replaced a stale handle");
        }
    }

    /// Removes the handle only if it is the same socket that reported the
    /// close; a newer socket on the same port is left alone.
    pub fn unregister(&mut self, port: u16, socket: u64) -> Option<SocketHandle> {
        match self.sockets.get(&port) {
            Some(handle) if handle.socket == socket => self.sockets.remove(&port),
            _ => None,
        }
    }

    pub fn is_current(&self, port: u16, socket: u64) -> bool {
        self.sockets.get(&port).is_some_and(|h| h.socket == socket)
    }

    pub fn is_empty(&self) -> bool {
        self.sockets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sockets.len()
    }

    pub fn ports(&self) -> Vec<u16> {
        self.sockets.keys().copied().collect()
    }

    pub fn lowest(&self) -> Option<u16> {
        self.sockets.keys().next().copied()
    }

    pub fn send(&self, port: u16, payload: &Value) -> Result<(), SendError> {
        let handle = self.sockets.get(&port).ok_or(SendError::NotConnected(port))?;
        if !handle.is_open() {
            return Err(SendError::NotConnected(port));
        }

        let text = serde_json::to_string(payload).map_err(|e| SendError::Serialize(e.to_string()))?;
        trace!(port, bytes = text.len(), "[Registry] Sending");
        handle
            .outbound
            .send(text)
            .map_err(|_| SendError::NotConnected(port))
    }

    /// Closes every socket. Returns the ports that were open, ascending.
    pub fn clear(&mut self) -> Vec<u16> {
        let ports = self.ports();
        self.sockets.clear();
        ports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry_with(ports: &[u16]) -> (SocketRegistry, Vec<Wire>, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut registry = SocketRegistry::default();
        let mut servers = Vec::new();
        for (i, port) in ports.iter().enumerate() {
            let (client, server) = Wire::pair();
            registry.register(SocketHandle::adopt(*port, i as u64, client, &tx));
            servers.push(server);
        }
        (registry, servers, rx)
    }

    #[tokio::test]
    async fn ports_are_ascending_and_lowest_routes() {
        let (registry, _servers, _rx) = registry_with(&[7702, 7700, 7701]);
        assert_eq!(registry.ports(), vec![7700, 7701, 7702]);
        assert_eq!(registry.lowest(), Some(7700));
        assert_eq!(registry.len(), 3);
    }

    #[tokio::test]
    async fn send_serializes_to_json_text() {
        let (registry, mut servers, _rx) = registry_with(&[7701]);
        registry.send(7701, &json!({"op": "add", "n": 2})).unwrap();
        let text = servers[0].inbound.recv().await.unwrap();
        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back, json!({"op": "add", "n": 2}));
    }

    #[tokio::test]
    async fn send_to_unknown_port_fails_quietly() {
        let (registry, _servers, _rx) = registry_with(&[7701]);
        assert_eq!(
            registry.send(7703, &json!(1)),
            Err(SendError::NotConnected(7703))
        );
    }

    #[tokio::test]
    async fn send_fails_once_the_peer_side_is_gone() {
        let (registry, mut servers, _rx) = registry_with(&[7701]);
        drop(servers.remove(0));
        assert_eq!(
            registry.send(7701, &json!(1)),
            Err(SendError::NotConnected(7701))
        );
    }

    #[tokio::test]
    async fn reader_forwards_frames_then_close() {
        let (_registry, mut servers, mut rx) = registry_with(&[7701]);
        let server = servers.remove(0);
        server.outbound.send("hello".into()).unwrap();
        drop(server);

        match rx.recv().await {
            Some(Event::Frame { port, text, .. }) => {
                assert_eq!(port, 7701);
                assert_eq!(text, "hello");
            }
            _ => panic!("expected a frame"),
        }
        assert!(matches!(rx.recv().await, Some(Event::Closed { port: 7701, .. })));
    }

    #[tokio::test]
    async fn stale_close_does_not_remove_newer_socket() {
        let (mut registry, _servers, _rx) = registry_with(&[7701]);
        assert!(registry.unregister(7701, 99).is_none());
        assert!(registry.is_current(7701, 0));
        assert!(registry.unregister(7701, 0).is_some());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn clear_closes_everything() {
        let (mut registry, mut servers, _rx) = registry_with(&[7700, 7701]);
        assert_eq!(registry.clear(), vec![7700, 7701]);
        assert!(registry.is_empty());
        for server in servers.iter_mut() {
            assert_eq!(server.inbound.recv().await, None);
        }
    }
}
