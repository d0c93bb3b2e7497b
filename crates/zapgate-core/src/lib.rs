// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Zapgate gateway.
//!
//! This crate provides the shared error type, the seam traits the engine
//! depends on (AI oracle, relay publisher), and small common types used
//! across the Zapgate workspace.

pub mod error;
pub mod traits;
pub mod types;

pub use error::GatewayError;
pub use traits::{EventPublisher, Oracle};
pub use types::{ChatTurn, TurnRole};
