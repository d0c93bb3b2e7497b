// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence for the Zapgate gateway.
//!
//! A single SQLite database holds an ordered key-value table; all writes
//! are serialized through tokio-rusqlite's one background thread, which is
//! also what makes the ledger's read-modify-write operations atomic. The
//! [`ConversationStore`] lays conversation records out under the
//! `message:`, `session:` and `hash:` prefixes so that lexicographic key
//! order equals time order.

pub mod conversation;
pub mod kv;
pub mod records;

pub use conversation::{ConversationStore, SaveMessage, SaveOutcome, SessionSeed, UserSummary};
pub use kv::SqliteKv;
pub use records::{Direction, MessageRecord, SessionOrigin, SessionRecord, Turn};
