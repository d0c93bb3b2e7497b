// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relay connectivity for the Zapgate gateway.
//!
//! One long-running task per configured relay URL maintains a websocket
//! subscription, reconnecting with exponential backoff until a
//! permanent-failure ceiling. Received events are handed to the dispatcher
//! channel without blocking; outbound events fan out to every live relay.

pub mod state;
pub mod supervisor;

pub use state::RelayStatus;
pub use supervisor::{IncomingEvent, RelayPool, SupervisorConfig};
