// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Leif Rydenfalk – https://github.com/Leif-Rydenfalk/cell

use dendrite_core::{BoxFuture, Connector, Endpoint, LinkError, Wire};
use futures::{SinkExt, StreamExt};
use std::io::ErrorKind;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, trace};

/// WebSocket transport: text frames over `ws://host:port`.
#[derive(Debug, Default, Clone)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(&self, endpoint: Endpoint) -> BoxFuture<'static, Result<Wire, LinkError>> {
        Box::pin(async move {
            let url = endpoint.url();
            let (stream, _response) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .map_err(|e| classify(&endpoint, e))?;

            debug!(port = endpoint.port(), "[Ws] Handshake complete with {}", endpoint);

            let (mut sink, mut source) = stream.split();
            let (outbound, mut outbox) = mpsc::unbounded_channel::<String>();
            let (inbox, inbound) = mpsc::unbounded_channel::<String>();
            let port = endpoint.port();

            // Writer: ends when the owner drops `outbound`, then says goodbye.
            tokio::spawn(async move {
                while let Some(text) = outbox.recv().await {
                    if let Err(e) = sink.send(Message::text(text)).await {
                        debug!(port, error = %e, "[Ws] Write failed");
                        break;
                    }
                }
                let _ = sink.close().await;
            });

            // Reader: ends on close frame, transport error, or when nobody listens.
            tokio::spawn(async move {
                while let Some(frame) = source.next().await {
                    let text = match frame {
                        Ok(Message::Text(text)) => text.to_string(),
                        Ok(Message::Binary(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
                        Ok(Message::Close(_)) => break,
                        Ok(_) => continue,
                        Err(e) => {
                            debug!(port, error = %e, "[Ws] Read failed");
                            break;
                        }
                    };
                    if inbox.send(text).is_err() {
                        break;
                    }
                }
                trace!(port, "[Ws] Reader finished");
            });

            Ok(Wire { outbound, inbound })
        })
    }
}

fn classify(endpoint: &Endpoint, error: tungstenite::Error) -> LinkError {
    match error {
        tungstenite::Error::Io(e) if e.kind() == ErrorKind::ConnectionRefused => {
            LinkError::Refused(endpoint.to_string())
        }
        tungstenite::Error::Io(e) => LinkError::Io(e),
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => LinkError::Closed,
        other => LinkError::Handshake {
            endpoint: endpoint.to_string(),
            reason: other.to_string(),
        },
    }
}
