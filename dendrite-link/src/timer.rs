// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Leif Rydenfalk – https://github.com/Leif-Rydenfalk/cell

use crate::supervisor::Event;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// A one-shot timer that posts an event back to the supervisor.
/// Dropping it cancels it, so replacing a timer can never leave a duplicate behind.
pub(crate) struct Timer {
    id: u64,
    handle: AbortHandle,
}

impl Timer {
    pub fn start(id: u64, delay: Duration, events: &mpsc::UnboundedSender<Event>, event: Event) -> Self {
        let events = events.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(event);
        })
        .abort_handle();

        Self { id, handle }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
