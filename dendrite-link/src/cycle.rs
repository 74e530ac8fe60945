// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Leif Rydenfalk – https://github.com/Leif-Rydenfalk/cell

use dendrite_core::dedup_ports;
use std::fmt;
use std::time::Duration;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleMode {
    /// Round-robin over the candidates until one handshake succeeds.
    UntilOneConnected,
    /// Visit each candidate once, keeping every success.
    SinglePass,
}

impl fmt::Display for CycleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleMode::UntilOneConnected => write!(f, "until-one-connected"),
            CycleMode::SinglePass => write!(f, "single-pass"),
        }
    }
}

/// Candidate ports minus the ones already connected, in configured order.
pub(crate) fn build_candidates(ports: &[u16], connected: &[u16]) -> Vec<u16> {
    dedup_ports(ports.iter().copied().filter(|p| !connected.contains(p)))
}

/// State of one discovery cycle. Exists only while the cycle is running.
pub(crate) struct PortCycle {
    mode: CycleMode,
    queue: Vec<u16>,
    cursor: usize,
    retry_delay: Duration,
}

impl PortCycle {
    pub fn start(mode: CycleMode, ports: &[u16], connected: &[u16], retry_delay: Duration) -> Self {
        Self {
            mode,
            queue: build_candidates(ports, connected),
            cursor: 0,
            retry_delay,
        }
    }

    pub fn mode(&self) -> CycleMode {
        self.mode
    }

    pub fn candidates(&self) -> &[u16] {
        &self.queue
    }

    /// Next port to dial, or `None` when the cycle is over.
    ///
    /// Ports that got connected since the cycle started are skipped without
    /// any delay. A single pass ends at the end of the list; the continuous
    /// mode wraps around.
    pub fn advance(&mut self, connected: &[u16]) -> Option<u16> {
        let mut skipped = 0;

        loop {
            if self.cursor >= self.queue.len() {
                match self.mode {
                    CycleMode::SinglePass => return None,
                    CycleMode::UntilOneConnected if self.queue.is_empty() => return None,
                    CycleMode::UntilOneConnected => self.cursor = 0,
                }
            }

            let port = self.queue[self.cursor];
            self.cursor += 1;

            if !connected.contains(&port) {
                return Some(port);
            }

            trace!(port, "[Cycle] Already connected, skipping");
            skipped += 1;
            // Every candidate is connected: nothing left to look for.
            if skipped >= self.queue.len() {
                return None;
            }
        }
    }

    /// Keeps attempts roughly `retry_delay` apart however fast the last one failed.
    pub fn next_delay(&self, elapsed: Duration) -> Duration {
        self.retry_delay.saturating_sub(elapsed)
    }
}
