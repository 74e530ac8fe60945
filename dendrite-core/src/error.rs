// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Leif Rydenfalk – https://github.com/Leif-Rydenfalk/cell

use thiserror::Error;

/// Why a connection attempt did not produce a usable socket.
/// Absorbed by the cycle; only ever logged and notified.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        endpoint: String,
        reason: &'static str,
    },

    #[error("connection refused by {0}")]
    Refused(String),

    #[error("handshake with {endpoint} failed: {reason}")]
    Handshake { endpoint: String, reason: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("link closed")]
    Closed,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("port {0} has no open connection")]
    NotConnected(u16),

    #[error("no connection is open")]
    NoConnection,

    #[error("payload could not be serialized: {0}")]
    Serialize(String),

    #[error("supervisor has shut down")]
    Closed,
}
