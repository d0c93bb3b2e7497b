// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The payment ledger for the Zapgate gateway.
//!
//! Balances are per-user sat counters under `balance:{pubkey}`; applied
//! receipts are recorded under `receipt:{event_id}` for idempotency. Every
//! mutation is a read-modify-write inside one closure on the store's
//! single connection thread, which makes debit atomic relative to
//! concurrent credit/debit for the same user.

pub mod balance;
pub mod receipt;

pub use balance::Ledger;
pub use receipt::ZapReceipt;
