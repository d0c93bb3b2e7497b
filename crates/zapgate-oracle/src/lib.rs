// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AI backend access for the Zapgate gateway.
//!
//! [`OracleClient`] talks to a Messages-style completion API over HTTP;
//! [`CircuitBreaker`] wraps any [`zapgate_core::Oracle`] with the
//! Closed/Open/HalfOpen guard and a per-call hard timeout, degrading to a
//! fallback string instead of surfacing provider failures to users.

pub mod breaker;
pub mod client;
pub mod types;

pub use breaker::{BreakerConfig, CircuitBreaker, CircuitState};
pub use client::OracleClient;
