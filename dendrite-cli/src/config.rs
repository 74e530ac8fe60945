// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Leif Rydenfalk – https://github.com/Leif-Rydenfalk/cell

use anyhow::{bail, Context, Result};
use clap::Parser;
use dendrite_link::{Endpoints, LinkConfig};
use std::env;
use std::time::Duration;

#[derive(Parser, Debug, Default)]
#[command(name = "dendrite")]
#[command(version, about = "Keep a live WebSocket link to a backend on one of several candidate ports")]
pub struct Cli {
    /// Backend host (overrides DENDRITE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Candidate ports in priority order, comma separated (overrides DENDRITE_PORTS)
    #[arg(long, value_delimiter = ',')]
    pub ports: Option<Vec<u16>>,

    /// Per-attempt timeout and retry spacing in ms (overrides DENDRITE_ATTEMPT_TIMEOUT_MS)
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Emit logs as JSON
    #[arg(long)]
    pub json: bool,

    /// Start disabled; type /connect to begin
    #[arg(long)]
    pub no_connect: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub endpoints: Endpoints,
    pub link: LinkConfig,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut endpoints = Endpoints::default();
        let mut link = LinkConfig::default();

        if let Some(host) = lookup("DENDRITE_HOST") {
            endpoints = endpoints.with_host(host.trim());
        }

        if let Some(raw) = lookup("DENDRITE_PORTS") {
            let ports = parse_ports(&raw).context("DENDRITE_PORTS must be a comma separated list of ports")?;
            endpoints = endpoints.with_ports(ports);
        }

        if let Some(raw) = lookup("DENDRITE_ATTEMPT_TIMEOUT_MS") {
            let ms = raw
                .trim()
                .parse::<u64>()
                .context("DENDRITE_ATTEMPT_TIMEOUT_MS must be an integer")?;
            link = link.with_attempt_timeout(Duration::from_millis(ms));
        }

        Ok(Self { endpoints, link })
    }

    /// Flags win over the environment.
    pub fn apply(mut self, cli: &Cli) -> Self {
        if let Some(host) = &cli.host {
            self.endpoints = self.endpoints.with_host(host.clone());
        }
        if let Some(ports) = &cli.ports {
            self.endpoints = self.endpoints.with_ports(ports.iter().copied());
        }
        if let Some(ms) = cli.timeout_ms {
            self.link = self.link.with_attempt_timeout(Duration::from_millis(ms));
        }
        self
    }
}

pub fn parse_ports(raw: &str) -> Result<Vec<u16>> {
    let ports = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u16>().with_context(|| format!("'{}' is not a port", s)))
        .collect::<Result<Vec<_>>>()?;

    if ports.contains(&0) {
        bail!("port 0 is not connectable");
    }
    Ok(ports)
}
