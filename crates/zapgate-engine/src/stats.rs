// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dispatcher-side counters.
//!
//! Together with [`crate::queue::QueueSnapshot`] and the relay statuses,
//! the snapshot here is the narrow read-only surface the dashboard
//! consumes. No component holds a pointer back into the engine.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters updated on the dispatch path.
#[derive(Debug, Default)]
pub struct EngineStats {
    duplicates: AtomicU64,
    own_events: AtomicU64,
    ignored_kinds: AtomicU64,
    rate_limited: AtomicU64,
    queue_rejected: AtomicU64,
    receipts_applied: AtomicU64,
    balance_queries: AtomicU64,
}

/// Point-in-time copy of [`EngineStats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSnapshot {
    pub duplicates: u64,
    pub own_events: u64,
    pub ignored_kinds: u64,
    pub rate_limited: u64,
    pub queue_rejected: u64,
    pub receipts_applied: u64,
    pub balance_queries: u64,
}

impl EngineStats {
    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_own_event(&self) {
        self.own_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ignored_kind(&self) {
        self.ignored_kinds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_queue_rejected(&self) {
        self.queue_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_receipt_applied(&self) {
        self.receipts_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_balance_query(&self) {
        self.balance_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            duplicates: self.duplicates.load(Ordering::Relaxed),
            own_events: self.own_events.load(Ordering::Relaxed),
            ignored_kinds: self.ignored_kinds.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            queue_rejected: self.queue_rejected.load(Ordering::Relaxed),
            receipts_applied: self.receipts_applied.load(Ordering::Relaxed),
            balance_queries: self.balance_queries.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_into_snapshot() {
        let stats = EngineStats::default();
        stats.record_duplicate();
        stats.record_duplicate();
        stats.record_rate_limited();
        stats.record_receipt_applied();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.duplicates, 2);
        assert_eq!(snapshot.rate_limited, 1);
        assert_eq!(snapshot.receipts_applied, 1);
        assert_eq!(snapshot.queue_rejected, 0);
    }
}
