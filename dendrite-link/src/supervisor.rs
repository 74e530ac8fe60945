// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Leif Rydenfalk – https://github.com/Leif-Rydenfalk/cell

//! The connection supervisor.
//!
//! All link state lives in one task. Commands from [`ConnectionSupervisor`]
//! handles, results from attempt/timer/reader tasks and configuration
//! changes are handled strictly one at a time, so nothing here is locked.
//! Helper tasks only ever post [`Event`]s back; every event carries the id
//! of the attempt, timer or socket that produced it and is dropped if that
//! id is no longer current.

use crate::attempt::SocketAttempt;
use crate::cycle::{CycleMode, PortCycle};
use crate::registry::{SocketHandle, SocketRegistry};
use crate::timer::Timer;
use crate::ws::WsConnector;
use dendrite_core::{
    ConnectionStatus, Connector, Endpoints, Inbound, LinkConfig, LinkError, LinkObserver,
    LinkState, SendError, Wire,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, trace, warn};

pub(crate) enum Event {
    AttemptResolved {
        attempt: u64,
        port: u16,
        result: Result<Wire, LinkError>,
    },
    AttemptTimedOut {
        attempt: u64,
    },
    RetryDue {
        timer: u64,
    },
    Frame {
        port: u16,
        socket: u64,
        text: String,
    },
    Closed {
        port: u16,
        socket: u64,
    },
}

enum Command {
    Enable,
    Disable {
        done: oneshot::Sender<()>,
    },
    Send {
        payload: Value,
        port: Option<u16>,
        reply: oneshot::Sender<Result<u16, SendError>>,
    },
}

/// Handle to the link. Cheap to clone; the link shuts down once every
/// handle is dropped.
#[derive(Clone)]
pub struct ConnectionSupervisor {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<LinkState>,
}

impl ConnectionSupervisor {
    /// Starts the supervisor task, disabled. Must be called inside a tokio runtime.
    pub fn spawn(
        mut endpoints: watch::Receiver<Endpoints>,
        config: LinkConfig,
        connector: Arc<dyn Connector>,
        observer: Arc<dyn LinkObserver>,
    ) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (events, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(LinkState::default());

        let current = endpoints.borrow_and_update().clone();
        let core = SupervisorCore {
            enabled: false,
            endpoints: current,
            config,
            connector,
            observer,
            events,
            state: state_tx,
            registry: SocketRegistry::default(),
            cycle: None,
            attempt: None,
            retry: None,
            next_id: 0,
            last_status: ConnectionStatus::Disconnected,
        };
        tokio::spawn(core.run(command_rx, event_rx, endpoints));

        Self { commands, state }
    }

    /// Supervisor over real WebSocket connections.
    pub fn websocket(
        endpoints: watch::Receiver<Endpoints>,
        config: LinkConfig,
        observer: Arc<dyn LinkObserver>,
    ) -> Self {
        Self::spawn(endpoints, config, Arc::new(WsConnector), observer)
    }

    /// Starts looking for the backend. When already connected, scans the
    /// remaining candidates once without touching existing links.
    pub fn enable(&self) {
        let _ = self.commands.send(Command::Enable);
    }

    /// Closes everything and stops all timers. Returns once applied.
    pub async fn disable(&self) {
        let (done, applied) = oneshot::channel();
        if self.commands.send(Command::Disable { done }).is_ok() {
            let _ = applied.await;
        }
    }

    /// Sends `payload` as JSON to `port`, or to the lowest connected port.
    /// Returns the port it went out on.
    pub async fn send<T>(&self, payload: &T, port: Option<u16>) -> Result<u16, SendError>
    where
        T: Serialize + ?Sized,
    {
        let payload =
            serde_json::to_value(payload).map_err(|e| SendError::Serialize(e.to_string()))?;
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Send {
                payload,
                port,
                reply,
            })
            .map_err(|_| SendError::Closed)?;
        response.await.map_err(|_| SendError::Closed)?
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state.borrow().status
    }

    pub fn connected_ports(&self) -> Vec<u16> {
        self.state.borrow().connected_ports.clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.state.borrow().enabled
    }

    pub fn state(&self) -> LinkState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LinkState> {
        self.state.clone()
    }
}

struct SupervisorCore {
    enabled: bool,
    endpoints: Endpoints,
    config: LinkConfig,
    connector: Arc<dyn Connector>,
    observer: Arc<dyn LinkObserver>,
    events: mpsc::UnboundedSender<Event>,
    state: watch::Sender<LinkState>,

    registry: SocketRegistry,
    cycle: Option<PortCycle>,
    attempt: Option<SocketAttempt>,
    retry: Option<Timer>,

    next_id: u64,
    last_status: ConnectionStatus,
}

impl SupervisorCore {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<Event>,
        mut endpoints: watch::Receiver<Endpoints>,
    ) {
        let mut watching = true;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(event) = events.recv() => self.handle_event(event),
                changed = endpoints.changed(), if watching => match changed {
                    Ok(()) => {
                        let next = endpoints.borrow_and_update().clone();
                        self.reconfigure(next);
                    }
                    Err(_) => {
                        debug!("[Supervisor] Configuration source dropped, keeping last endpoints");
                        watching = false;
                    }
                },
            }
        }

        self.enabled = false;
        self.reset();
        self.publish();
        debug!("[Supervisor] All handles dropped, shut down");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Enable => self.enable(),
            Command::Disable { done } => {
                self.disable();
                let _ = done.send(());
            }
            Command::Send {
                payload,
                port,
                reply,
            } => {
                let _ = reply.send(self.send(&payload, port));
            }
        }
    }

    fn handle_event(&mut self, event: Event) {
        if !self.enabled {
            // Late arrivals from sockets or timers that were mid-flight during disable.
            trace!("[Supervisor] Disabled, dropping event");
            return;
        }

        match event {
            Event::AttemptResolved {
                attempt,
                port,
                result,
            } => self.on_attempt_resolved(attempt, port, result),
            Event::AttemptTimedOut { attempt } => self.on_attempt_timed_out(attempt),
            Event::RetryDue { timer } => self.on_retry_due(timer),
            Event::Frame { port, socket, text } => self.on_frame(port, socket, text),
            Event::Closed { port, socket } => self.on_closed(port, socket),
        }
    }

    // ---------- commands ----------

    fn enable(&mut self) {
        self.enabled = true;

        if self.cycle.is_some() {
            debug!("[Supervisor] Cycle already running");
            self.publish();
            return;
        }

        if self.registry.is_empty() {
            self.begin_cycle(CycleMode::UntilOneConnected);
            self.sync_status(format!("Searching for backend on {}", self.endpoints.host()));
        } else {
            // Pick up backends that came up since we connected; existing links stay as they are.
            self.begin_cycle(CycleMode::SinglePass);
            self.sync_status("Scanning for additional backends");
        }
        self.step();
    }

    fn disable(&mut self) {
        if !self.enabled {
            return;
        }

        self.enabled = false;
        self.reset();
        info!("[Supervisor] Disabled");
        self.notify(None, "Disconnected".to_string());
    }

    fn reconfigure(&mut self, next: Endpoints) {
        if next == self.endpoints {
            return;
        }

        info!(host = next.host(), ports = ?next.ports(), "[Supervisor] Endpoints changed");
        let previous = std::mem::replace(&mut self.endpoints, next);

        if !self.enabled {
            return;
        }

        for port in self.reset() {
            let message = format!(
                "Disconnected from {} (configuration changed)",
                describe(&previous, port)
            );
            self.notify(Some(port), message);
        }
        self.begin_cycle(CycleMode::UntilOneConnected);
        self.sync_status(format!(
            "Configuration changed, searching for backend on {}",
            self.endpoints.host()
        ));
        self.step();
    }

    fn send(&self, payload: &Value, port: Option<u16>) -> Result<u16, SendError> {
        let port = match port {
            Some(port) => port,
            None => self.registry.lowest().ok_or(SendError::NoConnection)?,
        };
        self.registry.send(port, payload)?;
        Ok(port)
    }

    // ---------- cycle ----------

    /// Drops cycle, attempt, retry timer and every socket. Returns the ports
    /// that were connected.
    fn reset(&mut self) -> Vec<u16> {
        self.stop_cycle();
        let closed = self.registry.clear();
        if !closed.is_empty() {
            debug!(ports = ?closed, "[Supervisor] Closed all sockets");
        }
        closed
    }

    fn stop_cycle(&mut self) {
        self.cycle = None;
        self.retry = None;
        self.attempt = None;
    }

    fn begin_cycle(&mut self, mode: CycleMode) {
        self.stop_cycle();
        let connected = self.registry.ports();
        let cycle = PortCycle::start(
            mode,
            self.endpoints.ports(),
            &connected,
            self.config.attempt_timeout,
        );
        info!(%mode, candidates = ?cycle.candidates(), "[Cycle] Started");
        self.cycle = Some(cycle);
    }

    /// Dials the next candidate, or ends the cycle when there is none.
    fn step(&mut self) {
        let connected = self.registry.ports();
        let next = match self.cycle.as_mut() {
            Some(cycle) => cycle.advance(&connected),
            None => return,
        };

        match next {
            Some(port) => self.launch(port),
            None => {
                self.cycle = None;
                if self.registry.is_empty() {
                    warn!(host = self.endpoints.host(), "[Cycle] No candidate ports to try");
                    self.sync_status("No candidate ports to try");
                } else {
                    debug!("[Cycle] Pass complete");
                    self.sync_status("Scan complete");
                }
            }
        }
    }

    fn launch(&mut self, port: u16) {
        debug_assert!(self.attempt.is_none(), "a second attempt would overlap the first");

        let endpoint = match self.endpoints.endpoint(port) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                // Counts as a failed attempt; try again after the usual spacing.
                warn!(port, error = %e, "[Attempt] Cannot dial");
                self.notify(Some(port), e.to_string());
                self.schedule_next(Duration::ZERO);
                return;
            }
        };

        let id = self.next_id();
        self.attempt = Some(SocketAttempt::launch(
            id,
            endpoint,
            self.config.attempt_timeout,
            &self.connector,
            &self.events,
        ));
    }

    fn schedule_next(&mut self, elapsed: Duration) {
        let Some(cycle) = self.cycle.as_ref() else {
            return;
        };
        let delay = cycle.next_delay(elapsed);
        let id = self.next_id();
        trace!(delay_ms = delay.as_millis() as u64, "[Cycle] Next attempt scheduled");
        self.retry = Some(Timer::start(id, delay, &self.events, Event::RetryDue { timer: id }));
    }

    fn take_attempt(&mut self, id: u64) -> Option<SocketAttempt> {
        match &self.attempt {
            Some(attempt) if attempt.id() == id => self.attempt.take(),
            _ => None,
        }
    }

    // ---------- events ----------

    fn on_attempt_resolved(&mut self, id: u64, port: u16, result: Result<Wire, LinkError>) {
        let Some(attempt) = self.take_attempt(id) else {
            trace!(port, attempt = id, "[Attempt] Stale result dropped");
            return;
        };
        let endpoint = attempt.endpoint().clone();
        let elapsed = attempt.elapsed();
        drop(attempt);

        match result {
            Ok(wire) => self.on_open(port, wire, elapsed),
            Err(e) => {
                debug!(port, error = %e, "[Attempt] Failed");
                self.notify(Some(port), format!("No backend at {}: {}", endpoint, e));
                self.schedule_next(elapsed);
            }
        }
    }

    fn on_attempt_timed_out(&mut self, id: u64) {
        let Some(attempt) = self.take_attempt(id) else {
            trace!(attempt = id, "[Attempt] Stale timeout dropped");
            return;
        };
        let port = attempt.port();
        let endpoint = attempt.endpoint().clone();
        let elapsed = attempt.elapsed();
        // Force-closes the half-open socket.
        drop(attempt);

        debug!(port, elapsed_ms = elapsed.as_millis() as u64, "[Attempt] Timed out");
        self.notify(Some(port), format!("Timed out connecting to {}", endpoint));
        self.schedule_next(elapsed);
    }

    fn on_open(&mut self, port: u16, wire: Wire, elapsed: Duration) {
        let socket = self.next_id();
        self.registry
            .register(SocketHandle::adopt(port, socket, wire, &self.events));

        let mode = self.cycle.as_ref().map(PortCycle::mode);
        if mode == Some(CycleMode::UntilOneConnected) {
            // One live link is enough.
            self.cycle = None;
        }

        info!(port, "[Supervisor] ✓ Connected to {}", self.describe(port));
        self.notify(Some(port), format!("Connected to {}", self.describe(port)));

        if mode == Some(CycleMode::SinglePass) {
            self.schedule_next(elapsed);
        }
    }

    fn on_retry_due(&mut self, id: u64) {
        match &self.retry {
            Some(timer) if timer.id() == id => {
                self.retry = None;
                self.step();
            }
            _ => trace!(timer = id, "[Cycle] Stale retry dropped"),
        }
    }

    fn on_frame(&mut self, port: u16, socket: u64, text: String) {
        if !self.registry.is_current(port, socket) {
            trace!(port, "[Registry] Frame from a retired socket dropped");
            return;
        }
        self.observer.on_message(Inbound::decode(text), port);
    }

    fn on_closed(&mut self, port: u16, socket: u64) {
        if self.registry.unregister(port, socket).is_none() {
            trace!(port, "[Registry] Close from a retired socket dropped");
            return;
        }

        let heal = self.registry.is_empty();
        if heal {
            warn!(port, "[Supervisor] Lost the last connection, searching again");
            self.begin_cycle(CycleMode::UntilOneConnected);
            self.notify(
                Some(port),
                format!("Lost connection to {}, searching", self.describe(port)),
            );
            self.step();
        } else {
            info!(port, "[Supervisor] Disconnected from {}", self.describe(port));
            self.notify(Some(port), format!("Disconnected from {}", self.describe(port)));
        }
    }

    // ---------- status ----------

    fn status(&self) -> ConnectionStatus {
        ConnectionStatus::derive(self.registry.len(), self.cycle.is_some())
    }

    fn publish(&mut self) -> ConnectionStatus {
        let status = self.status();
        let next = LinkState {
            enabled: self.enabled,
            status,
            connected_ports: self.registry.ports(),
        };
        self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        status
    }

    fn notify(&mut self, port: Option<u16>, message: String) {
        let status = self.publish();
        self.last_status = status;
        self.observer.on_status(status, port, &message);
    }

    /// Publishes state and emits a notification only if the status changed.
    fn sync_status(&mut self, message: impl Into<String>) {
        if self.publish() != self.last_status {
            self.notify(None, message.into());
        }
    }

    fn describe(&self, port: u16) -> String {
        describe(&self.endpoints, port)
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

fn describe(endpoints: &Endpoints, port: u16) -> String {
    endpoints
        .endpoint(port)
        .map(|e| e.to_string())
        .unwrap_or_else(|_| format!("{}:{}", endpoints.host(), port))
}
