// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Leif Rydenfalk – https://github.com/Leif-Rydenfalk/cell

pub mod config;
pub mod connector;
pub mod endpoint;
pub mod envelope;
pub mod error;
pub mod observer;
pub mod status;

pub use config::LinkConfig;
pub use connector::{BoxFuture, Connector, Wire};
pub use endpoint::{dedup_ports, Endpoint, Endpoints, DEFAULT_HOST, DEFAULT_PORT};
pub use envelope::Inbound;
pub use error::{LinkError, SendError};
pub use observer::{ChannelObserver, LinkEvent, LinkObserver, NullObserver};
pub use status::{ConnectionStatus, LinkState};
