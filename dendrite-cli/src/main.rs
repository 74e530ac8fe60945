// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Leif Rydenfalk – https://github.com/Leif-Rydenfalk/cell

mod config;
mod console;
mod logging;

use anyhow::Result;
use clap::Parser;
use config::{Cli, Settings};
use console::{ConsoleCommand, ConsoleObserver};
use dendrite_link::{ConnectionSupervisor, Endpoints};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.json);

    let settings = Settings::from_env()?.apply(&cli);
    info!(
        host = settings.endpoints.host(),
        ports = ?settings.endpoints.ports(),
        timeout_ms = settings.link.attempt_timeout.as_millis() as u64,
        "Console ready (/help for commands)"
    );

    let (endpoints_tx, endpoints_rx) = watch::channel(settings.endpoints.clone());
    let link = ConnectionSupervisor::websocket(endpoints_rx, settings.link, Arc::new(ConsoleObserver));

    if !cli.no_connect {
        link.enable();
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match console::parse_line(&line) {
                    Ok(Some(ConsoleCommand::Quit)) => break,
                    Ok(Some(command)) => run(command, &link, &endpoints_tx).await,
                    Ok(None) => {}
                    Err(e) => warn!("{:#}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    link.disable().await;
    Ok(())
}

async fn run(command: ConsoleCommand, link: &ConnectionSupervisor, endpoints: &watch::Sender<Endpoints>) {
    match command {
        ConsoleCommand::Connect => link.enable(),
        ConsoleCommand::Disconnect => link.disable().await,
        ConsoleCommand::Status => {
            let state = link.state();
            let current = endpoints.borrow().clone();
            info!(
                enabled = state.enabled,
                status = %state.status,
                connected = ?state.connected_ports,
                host = current.host(),
                candidates = ?current.ports(),
                "Status"
            );
        }
        ConsoleCommand::Host(host) => {
            endpoints.send_modify(|current| *current = current.clone().with_host(host));
        }
        ConsoleCommand::Ports(ports) => {
            endpoints.send_modify(|current| *current = current.clone().with_ports(ports));
        }
        ConsoleCommand::Send { port, payload } => match link.send(&payload, port).await {
            Ok(port) => info!(port, "Sent"),
            Err(e) => warn!("Send failed: {}", e),
        },
        ConsoleCommand::Help => eprintln!("{}", console::HELP),
        ConsoleCommand::Quit => {}
    }
}
