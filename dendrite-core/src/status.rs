// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Leif Rydenfalk – https://github.com/Leif-Rydenfalk/cell

use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregate status of the link. Always derived, never assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionStatus {
    /// `connected` wins over an active cycle; an idle, empty link is `disconnected`.
    pub fn derive(open_connections: usize, cycle_active: bool) -> Self {
        if open_connections > 0 {
            ConnectionStatus::Connected
        } else if cycle_active {
            ConnectionStatus::Connecting
        } else {
            ConnectionStatus::Disconnected
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
        }
    }
}

/// Snapshot published after every mutation of the supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct LinkState {
    pub enabled: bool,
    pub status: ConnectionStatus,
    /// Ascending.
    pub connected_ports: Vec<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_projection_of_registry_and_cycle() {
        assert_eq!(ConnectionStatus::derive(0, false), ConnectionStatus::Disconnected);
        assert_eq!(ConnectionStatus::derive(0, true), ConnectionStatus::Connecting);
        assert_eq!(ConnectionStatus::derive(2, true), ConnectionStatus::Connected);
        assert_eq!(ConnectionStatus::derive(1, false), ConnectionStatus::Connected);
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&ConnectionStatus::Connecting).unwrap();
        assert_eq!(json, "\"connecting\"");
        assert_eq!(ConnectionStatus::Connected.to_string(), "connected");
    }
}
