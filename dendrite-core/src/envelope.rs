// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Leif Rydenfalk – https://github.com/Leif-Rydenfalk/cell

use serde::Serialize;
use serde_json::Value;

/// An inbound frame. Frames that are not valid JSON are kept as raw text
/// rather than dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Inbound {
    Document(Value),
    Raw(String),
}

impl Inbound {
    pub fn decode(text: String) -> Self {
        match serde_json::from_str::<Value>(&text) {
            Ok(doc) => Inbound::Document(doc),
            Err(_) => Inbound::Raw(text),
        }
    }

    pub fn as_document(&self) -> Option<&Value> {
        match self {
            Inbound::Document(doc) => Some(doc),
            Inbound::Raw(_) => None,
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Inbound::Raw(_))
    }
}
