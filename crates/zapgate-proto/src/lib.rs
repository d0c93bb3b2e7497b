// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event wire model for the Zapgate gateway.
//!
//! Events are the protocol's only object: signed, immutable JSON records
//! identified by a content hash and fanned out across relays. This crate
//! holds the event schema, the kind and tag vocabulary the gateway speaks,
//! subscription filters, and the framed messages exchanged with relays.

pub mod event;
pub mod filter;
pub mod frame;
pub mod kind;
pub mod tag;

pub use event::{Event, EventDraft};
pub use filter::Filter;
pub use frame::{ClientFrame, RelayFrame};
pub use kind::EventKind;
pub use tag::Tag;

use thiserror::Error;

/// Errors produced while parsing wire data.
#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
