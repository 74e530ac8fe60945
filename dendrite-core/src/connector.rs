// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Leif Rydenfalk – https://github.com/Leif-Rydenfalk/cell

use crate::endpoint::Endpoint;
use crate::error::LinkError;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One end of an established, full-duplex text link.
///
/// `inbound` ending is the close event of the socket. Dropping `outbound`
/// asks the other side to close.
#[derive(Debug)]
pub struct Wire {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<String>,
}

impl Wire {
    /// Two connected in-memory ends: `(client, server)`.
    pub fn pair() -> (Wire, Wire) {
        let (to_server, from_client) = mpsc::unbounded_channel();
        let (to_client, from_server) = mpsc::unbounded_channel();
        (
            Wire {
                outbound: to_server,
                inbound: from_server,
            },
            Wire {
                outbound: to_client,
                inbound: from_client,
            },
        )
    }
}

/// Client-side: opens a link to one endpoint. Resolves once the handshake
/// has completed. Dropping the future abandons the attempt.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, endpoint: Endpoint) -> BoxFuture<'static, Result<Wire, LinkError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pair_is_cross_wired() {
        let (client, mut server) = Wire::pair();
        client.outbound.send("ping".into()).unwrap();
        assert_eq!(server.inbound.recv().await.as_deref(), Some("ping"));

        drop(client);
        assert_eq!(server.inbound.recv().await, None);
    }
}
