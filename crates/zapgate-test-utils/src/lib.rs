// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic mocks and fixtures for Zapgate tests.
//!
//! `MockOracle` replaces the AI backend with scripted responses;
//! `RecordingPublisher` captures outbound events instead of touching
//! relays; the fixture helpers build signed (and encrypted) inbound
//! events from deterministic keypairs.

pub mod fixtures;
pub mod mock_oracle;
pub mod mock_publisher;

pub use fixtures::{dm_event, mention_event, receipt_event, signer};
pub use mock_oracle::MockOracle;
pub use mock_publisher::RecordingPublisher;
