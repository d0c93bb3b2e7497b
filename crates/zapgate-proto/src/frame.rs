// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Framed messages exchanged with relays.
//!
//! Both directions use JSON arrays with a leading type string:
//! client → relay: `["REQ", sub, filter...]`, `["EVENT", event]`,
//! `["CLOSE", sub]`; relay → client: `["EVENT", sub, event]`,
//! `["EOSE", sub]`, `["OK", id, accepted, message]`,
//! `["CLOSED", sub, message]`, `["NOTICE", message]`.

use serde_json::{json, Value};

use crate::event::Event;
use crate::filter::Filter;
use crate::ProtoError;

/// Messages the gateway sends to a relay.
#[derive(Debug, Clone)]
pub enum ClientFrame {
    Req { sub_id: String, filters: Vec<Filter> },
    Event(Event),
    Close { sub_id: String },
}

impl ClientFrame {
    pub fn to_json(&self) -> String {
        match self {
            ClientFrame::Req { sub_id, filters } => {
                let mut parts = vec![json!("REQ"), json!(sub_id)];
                parts.extend(filters.iter().map(|f| json!(f)));
                Value::Array(parts).to_string()
            }
            ClientFrame::Event(event) => json!(["EVENT", event]).to_string(),
            ClientFrame::Close { sub_id } => json!(["CLOSE", sub_id]).to_string(),
        }
    }
}

/// Messages a relay sends to the gateway.
#[derive(Debug, Clone)]
pub enum RelayFrame {
    Event { sub_id: String, event: Event },
    Eose { sub_id: String },
    Ok { event_id: String, accepted: bool, message: String },
    Closed { sub_id: String, message: String },
    Notice { message: String },
    /// Frame types the gateway does not handle (e.g. AUTH).
    Unknown { label: String },
}

impl RelayFrame {
    pub fn parse(text: &str) -> Result<Self, ProtoError> {
        let value: Value = serde_json::from_str(text)?;
        let parts = value
            .as_array()
            .ok_or_else(|| ProtoError::MalformedFrame("not an array".into()))?;
        let label = parts
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| ProtoError::MalformedFrame("missing type label".into()))?;

        match label {
            "EVENT" => {
                let sub_id = str_at(parts, 1)?;
                let event_value = parts
                    .get(2)
                    .ok_or_else(|| ProtoError::MalformedFrame("EVENT missing payload".into()))?;
                let event: Event = serde_json::from_value(event_value.clone())?;
                Ok(RelayFrame::Event { sub_id, event })
            }
            "EOSE" => Ok(RelayFrame::Eose {
                sub_id: str_at(parts, 1)?,
            }),
            "OK" => Ok(RelayFrame::Ok {
                event_id: str_at(parts, 1)?,
                accepted: parts.get(2).and_then(Value::as_bool).unwrap_or(false),
                message: parts
                    .get(3)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }),
            "CLOSED" => Ok(RelayFrame::Closed {
                sub_id: str_at(parts, 1)?,
                message: parts
                    .get(2)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }),
            "NOTICE" => Ok(RelayFrame::Notice {
                message: parts
                    .get(1)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }),
            other => Ok(RelayFrame::Unknown {
                label: other.to_string(),
            }),
        }
    }
}

fn str_at(parts: &[Value], index: usize) -> Result<String, ProtoError> {
    parts
        .get(index)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| ProtoError::MalformedFrame(format!("missing string at index {index}")))
}
