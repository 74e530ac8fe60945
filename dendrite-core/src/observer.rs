// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Leif Rydenfalk – https://github.com/Leif-Rydenfalk/cell

use crate::envelope::Inbound;
use crate::status::ConnectionStatus;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Observational hooks. Called from the supervisor task; implementations
/// must not block.
pub trait LinkObserver: Send + Sync + 'static {
    fn on_status(&self, _status: ConnectionStatus, _port: Option<u16>, _message: &str) {}

    fn on_message(&self, _payload: Inbound, _port: u16) {}
}

pub struct NullObserver;

impl LinkObserver for NullObserver {}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Status {
        status: ConnectionStatus,
        port: Option<u16>,
        message: String,
    },
    Message {
        payload: Inbound,
        port: u16,
    },
}

/// Forwards every notification into an unbounded channel.
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<LinkEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<LinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl LinkObserver for ChannelObserver {
    fn on_status(&self, status: ConnectionStatus, port: Option<u16>, message: &str) {
        // Receiver gone means nobody is listening any more.
        let _ = self.tx.send(LinkEvent::Status {
            status,
            port,
            message: message.to_string(),
        });
    }

    fn on_message(&self, payload: Inbound, port: u16) {
        let _ = self.tx.send(LinkEvent::Message { payload, port });
    }
}
