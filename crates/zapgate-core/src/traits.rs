// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seam traits between the processing engine and its external collaborators.
//!
//! The engine never talks to the AI backend or the relay pool directly; it
//! goes through these traits so tests can substitute deterministic mocks.

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::types::ChatTurn;
use zapgate_proto::Event;

/// A request/response text-generation backend.
///
/// `history` is the bounded conversation context, oldest turn first. The
/// new user message is passed separately as `prompt`.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn generate(&self, prompt: &str, history: &[ChatTurn])
        -> Result<String, GatewayError>;
}

/// Fan-out publisher for signed events.
///
/// Publishing is at-least-once: the call succeeds when at least one relay
/// accepted the event, and fails with [`GatewayError::PublishFailed`] when
/// none did.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: Event) -> Result<(), GatewayError>;
}
