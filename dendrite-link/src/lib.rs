// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Leif Rydenfalk – https://github.com/Leif-Rydenfalk/cell

mod attempt;
mod cycle;
mod registry;
mod timer;

pub mod supervisor;
pub mod ws;

pub use cycle::CycleMode;
pub use supervisor::ConnectionSupervisor;
pub use ws::WsConnector;

pub use dendrite_core::*;
