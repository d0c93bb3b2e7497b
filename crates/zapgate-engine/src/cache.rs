// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded in-memory caches for redundant-delivery suppression.
//!
//! [`ProcessedEventCache`] remembers recently handled event ids with FIFO
//! eviction. [`FingerprintCache`] remembers `(author, content)` pairs with
//! a TTL plus FIFO eviction, so retransmissions with fresh event ids are
//! still suppressed within the window.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use bitcoin_hashes::{sha256, Hash};
use tokio::time::Instant;

/// FIFO-bounded set of recently handled event ids.
pub struct ProcessedEventCache {
    cap: usize,
    inner: Mutex<ProcessedInner>,
}

struct ProcessedInner {
    set: HashSet<String>,
    order: VecDeque<String>,
}

impl ProcessedEventCache {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            inner: Mutex::new(ProcessedInner {
                set: HashSet::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Inserts the id, returning `false` when it was already present.
    /// Evicts the oldest entry once the cap is exceeded.
    pub fn insert(&self, event_id: &str) -> bool {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        if inner.set.contains(event_id) {
            return false;
        }
        inner.set.insert(event_id.to_string());
        inner.order.push_back(event_id.to_string());
        while inner.order.len() > self.cap {
            if let Some(oldest) = inner.order.pop_front() {
                inner.set.remove(&oldest);
            }
        }
        true
    }

    pub fn contains(&self, event_id: &str) -> bool {
        self.inner
            .lock()
            .expect("cache lock poisoned")
            .set
            .contains(event_id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// TTL + FIFO bounded map of `(author, content)` fingerprints.
pub struct FingerprintCache {
    cap: usize,
    ttl: Duration,
    inner: Mutex<FingerprintInner>,
}

struct FingerprintInner {
    map: HashMap<String, Instant>,
    order: VecDeque<String>,
}

impl FingerprintCache {
    pub fn new(cap: usize, ttl: Duration) -> Self {
        Self {
            cap,
            ttl,
            inner: Mutex::new(FingerprintInner {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Records the `(author, content)` pair. Returns `false` when an
    /// unexpired entry already exists; an expired entry is refreshed.
    pub fn insert_if_fresh(&self, author: &str, content: &str) -> bool {
        let key = fingerprint(author, content);
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("cache lock poisoned");

        if let Some(seen_at) = inner.map.get(&key) {
            if now.duration_since(*seen_at) < self.ttl {
                return false;
            }
        }

        inner.map.insert(key.clone(), now);
        inner.order.push_back(key);
        while inner.order.len() > self.cap {
            if let Some(oldest) = inner.order.pop_front() {
                inner.map.remove(&oldest);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn fingerprint(author: &str, content: &str) -> String {
    let data = format!("{author}\u{1f}{content}");
    sha256::Hash::hash(data.as_bytes()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_cache_suppresses_repeats() {
        let cache = ProcessedEventCache::new(10);
        assert!(cache.insert("e1"));
        assert!(!cache.insert("e1"));
        assert!(cache.contains("e1"));
        assert!(cache.insert("e2"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn event_cache_evicts_oldest_at_cap() {
        let cache = ProcessedEventCache::new(3);
        for id in ["a", "b", "c", "d"] {
            assert!(cache.insert(id));
        }
        assert_eq!(cache.len(), 3);
        // "a" was evicted, so it can be inserted again.
        assert!(!cache.contains("a"));
        assert!(cache.insert("a"));
        // Now "b" is the evicted one.
        assert!(!cache.contains("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn fingerprints_expire_after_ttl() {
        let cache = FingerprintCache::new(100, Duration::from_secs(300));

        assert!(cache.insert_if_fresh("alice", "hello"));
        assert!(!cache.insert_if_fresh("alice", "hello"));
        // Different author or content is a different fingerprint.
        assert!(cache.insert_if_fresh("bob", "hello"));
        assert!(cache.insert_if_fresh("alice", "hello!"));

        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(cache.insert_if_fresh("alice", "hello"));
    }

    #[tokio::test(start_paused = true)]
    async fn fingerprints_within_ttl_stay_suppressed() {
        let cache = FingerprintCache::new(100, Duration::from_secs(300));
        assert!(cache.insert_if_fresh("alice", "hello"));
        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(!cache.insert_if_fresh("alice", "hello"));
    }

    #[test]
    fn fingerprint_cache_is_bounded() {
        let cache = FingerprintCache::new(2, Duration::from_secs(300));
        assert!(cache.insert_if_fresh("u", "one"));
        assert!(cache.insert_if_fresh("u", "two"));
        assert!(cache.insert_if_fresh("u", "three"));
        assert_eq!(cache.len(), 2);
        // The oldest entry fell out, so it is fresh again.
        assert!(cache.insert_if_fresh("u", "one"));
    }
}
