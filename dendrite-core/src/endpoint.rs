// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Leif Rydenfalk – https://github.com/Leif-Rydenfalk/cell

use crate::error::LinkError;
use std::collections::HashSet;
use std::fmt;

pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Port the backend bridge listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 61777;

/// Host plus the ordered candidate ports the backend may be listening on.
/// This is the value carried by the reactive configuration source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    host: String,
    ports: Vec<u16>,
}

impl Endpoints {
    pub fn new(host: impl Into<String>, ports: impl IntoIterator<Item = u16>) -> Self {
        Self {
            host: host.into(),
            ports: dedup_ports(ports),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Candidates in first-occurrence order, each port once.
    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_ports(mut self, ports: impl IntoIterator<Item = u16>) -> Self {
        self.ports = dedup_ports(ports);
        self
    }

    pub fn endpoint(&self, port: u16) -> Result<Endpoint, LinkError> {
        Endpoint::new(&self.host, port)
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, [DEFAULT_PORT])
    }
}

pub fn dedup_ports(ports: impl IntoIterator<Item = u16>) -> Vec<u16> {
    let mut seen = HashSet::new();
    ports.into_iter().filter(|p| seen.insert(*p)).collect()
}

/// A single validated `host:port` target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn new(host: &str, port: u16) -> Result<Self, LinkError> {
        let invalid = |reason| LinkError::InvalidEndpoint {
            endpoint: format!("{}:{}", host, port),
            reason,
        };

        let host = host.trim();
        if host.is_empty() {
            return Err(invalid("host is empty"));
        }
        if host.contains("://") || host.contains('/') {
            return Err(invalid("host must not carry a scheme or path"));
        }
        if host.chars().any(char::is_whitespace) {
            return Err(invalid("host contains whitespace"));
        }
        if port == 0 {
            return Err(invalid("port 0 is not connectable"));
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Bare IPv6 literals need brackets before the port.
        if self.host.contains(':') && !self.host.starts_with('[') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
