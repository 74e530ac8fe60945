// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Leif Rydenfalk – https://github.com/Leif-Rydenfalk/cell

use std::time::Duration;

pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Upper bound on a single handshake. Also the nominal spacing between
    /// consecutive attempts of a cycle.
    pub attempt_timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }
}

impl LinkConfig {
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }
}
