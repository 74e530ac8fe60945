// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Leif Rydenfalk – https://github.com/Leif-Rydenfalk/cell

use crate::supervisor::Event;
use crate::timer::Timer;
use dendrite_core::{Connector, Endpoint};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::debug;

/// The single outstanding connection attempt.
///
/// The handshake runs in its own task and reports back as
/// `Event::AttemptResolved`; a timer races it with `Event::AttemptTimedOut`.
/// Whichever arrives first wins, the other carries a stale id.
pub(crate) struct SocketAttempt {
    id: u64,
    endpoint: Endpoint,
    started: Instant,
    task: AbortHandle,
    _deadline: Timer,
}

impl SocketAttempt {
    pub fn launch(
        id: u64,
        endpoint: Endpoint,
        timeout: Duration,
        connector: &Arc<dyn Connector>,
        events: &mpsc::UnboundedSender<Event>,
    ) -> Self {
        debug!(port = endpoint.port(), attempt = id, "[Attempt] Dialing {}", endpoint);

        let started = Instant::now();
        let port = endpoint.port();
        let handshake = connector.connect(endpoint.clone());

        let tx = events.clone();
        let task = tokio::spawn(async move {
            let result = handshake.await;
            let _ = tx.send(Event::AttemptResolved {
                attempt: id,
                port,
                result,
            });
        })
        .abort_handle();

        let deadline = Timer::start(id, timeout, events, Event::AttemptTimedOut { attempt: id });

        Self {
            id,
            endpoint,
            started,
            task,
            _deadline: deadline,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn port(&self) -> u16 {
        self.endpoint.port()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for SocketAttempt {
    // Abandons the handshake (and with it the half-open socket) and stops the deadline.
    fn drop(&mut self) {
        self.task.abort();
    }
}
