// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Leif Rydenfalk – https://github.com/Leif-Rydenfalk/cell

use crate::config::parse_ports;
use anyhow::{bail, Context, Result};
use dendrite_link::{ConnectionStatus, Inbound, LinkObserver};
use serde_json::{json, Value};
use tracing::{info, warn};

pub const HELP: &str = "\
commands:
  /connect               enable the link
  /disconnect            disable the link and close every socket
  /status                print the link state
  /host <addr>           switch backend host
  /ports <p1,p2,...>     replace the candidate ports
  /send <port> <payload> send to one port
  /quit                  disable and exit
anything else is sent to the lowest connected port (JSON if it parses, string otherwise)";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Connect,
    Disconnect,
    Status,
    Host(String),
    Ports(Vec<u16>),
    Send { port: Option<u16>, payload: Value },
    Help,
    Quit,
}

/// Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(ConsoleCommand::Send {
            port: None,
            payload: payload(line),
        }));
    };

    let (verb, args) = match rest.split_once(char::is_whitespace) {
        Some((verb, args)) => (verb, args.trim()),
        None => (rest, ""),
    };

    let command = match verb {
        "connect" => ConsoleCommand::Connect,
        "disconnect" => ConsoleCommand::Disconnect,
        "status" => ConsoleCommand::Status,
        "help" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        "host" => {
            if args.is_empty() {
                bail!("usage: /host <addr>");
            }
            ConsoleCommand::Host(args.to_string())
        }
        "ports" => ConsoleCommand::Ports(parse_ports(args).context("usage: /ports <p1,p2,...>")?),
        "send" => {
            let (port, body) = args
                .split_once(char::is_whitespace)
                .context("usage: /send <port> <payload>")?;
            let port = port
                .parse::<u16>()
                .with_context(|| format!("'{}' is not a port", port))?;
            ConsoleCommand::Send {
                port: Some(port),
                payload: payload(body.trim()),
            }
        }
        other => bail!("unknown command /{} (try /help)", other),
    };
    Ok(Some(command))
}

fn payload(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Prints inbound messages to stdout as JSON lines and logs status changes.
pub struct ConsoleObserver;

impl LinkObserver for ConsoleObserver {
    fn on_status(&self, status: ConnectionStatus, port: Option<u16>, message: &str) {
        match status {
            ConnectionStatus::Disconnected => warn!(%status, ?port, "{}", message),
            _ => info!(%status, ?port, "{}", message),
        }
    }

    fn on_message(&self, payload: Inbound, port: u16) {
        let line = json!({ "port": port, "message": payload });
        println!("{}", line);
    }
}
