// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user token bucket rate limiting with lazy refill.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Token bucket tuning.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Bucket capacity; new buckets start full.
    pub max_tokens: u32,
    /// Tokens restored per second.
    pub refill_rate: f64,
    /// Buckets idle longer than this are swept.
    pub idle_window: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_tokens: 50,
            refill_rate: 5.0,
            idle_window: Duration::from_secs(60),
        }
    }
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Denied { retry_after_secs: u64 },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Per-key token buckets, lazily refilled on each check.
pub struct RateLimiter {
    config: RateLimiterConfig,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Takes one token for `key` if available, otherwise reports how long
    /// until the next token accrues.
    pub fn check(&self, key: &str) -> RateDecision {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().expect("limiter lock poisoned");
        let max = f64::from(self.config.max_tokens);

        let bucket = buckets.entry(key.to_string()).or_insert_with(|| Bucket {
            tokens: max,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.config.refill_rate).min(max);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            RateDecision::Allowed {
                remaining: bucket.tokens.floor() as u32,
            }
        } else {
            let deficit = 1.0 - bucket.tokens;
            let retry_after = deficit / self.config.refill_rate;
            let retry_after_secs = if retry_after.is_finite() {
                retry_after.ceil() as u64
            } else {
                // Zero refill rate: the bucket only recovers via the idle
                // sweep, so point at the window.
                self.config.idle_window.as_secs().max(1)
            };
            RateDecision::Denied { retry_after_secs }
        }
    }

    /// Drops buckets that have been idle longer than the window.
    pub fn sweep_idle(&self) {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().expect("limiter lock poisoned");
        let before = buckets.len();
        buckets.retain(|_, bucket| now.duration_since(bucket.last_refill) <= self.config.idle_window);
        let swept = before - buckets.len();
        if swept > 0 {
            debug!(swept, remaining = buckets.len(), "idle rate buckets swept");
        }
    }

    pub fn tracked_keys(&self) -> usize {
        self.buckets.lock().expect("limiter lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_tokens: u32, refill_rate: f64) -> RateLimiter {
        RateLimiter::new(RateLimiterConfig {
            max_tokens,
            refill_rate,
            idle_window: Duration::from_secs(60),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_bucket_allows_up_to_capacity() {
        let limiter = limiter(2, 0.0);

        assert!(limiter.check("u1").is_allowed());
        assert!(limiter.check("u1").is_allowed());
        match limiter.check("u1") {
            RateDecision::Denied { retry_after_secs } => assert!(retry_after_secs >= 1),
            other => panic!("expected denial, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn keys_have_independent_buckets() {
        let limiter = limiter(1, 0.0);
        assert!(limiter.check("u1").is_allowed());
        assert!(!limiter.check("u1").is_allowed());
        assert!(limiter.check("u2").is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn tokens_refill_over_time() {
        let limiter = limiter(2, 1.0);
        assert!(limiter.check("u1").is_allowed());
        assert!(limiter.check("u1").is_allowed());
        assert!(!limiter.check("u1").is_allowed());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(limiter.check("u1").is_allowed());
        assert!(!limiter.check("u1").is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn refill_never_exceeds_capacity() {
        let limiter = limiter(2, 10.0);
        assert!(limiter.check("u1").is_allowed());

        tokio::time::advance(Duration::from_secs(3600)).await;
        // Capacity is 2, so exactly two checks pass.
        assert!(limiter.check("u1").is_allowed());
        assert!(limiter.check("u1").is_allowed());
        assert!(!limiter.check("u1").is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_reflects_deficit() {
        let limiter = limiter(1, 0.5);
        assert!(limiter.check("u1").is_allowed());
        match limiter.check("u1") {
            RateDecision::Denied { retry_after_secs } => {
                // One token at 0.5/s takes 2 seconds.
                assert_eq!(retry_after_secs, 2);
            }
            other => panic!("expected denial, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn admission_is_bounded_by_capacity_plus_refill() {
        // Property: within T seconds at most max_tokens + refill_rate * T
        // checks are admitted.
        let limiter = limiter(5, 2.0);
        let mut admitted = 0;

        for _ in 0..10 {
            // 10 rounds of 1 second, hammering each round.
            for _ in 0..20 {
                if limiter.check("u1").is_allowed() {
                    admitted += 1;
                }
            }
            tokio::time::advance(Duration::from_secs(1)).await;
        }

        // 5 initial + 2/s * 10s = 25 maximum.
        assert!(admitted <= 25, "admitted {admitted}");
        assert!(admitted >= 24, "refill should keep admitting, got {admitted}");
    }

    #[tokio::test(start_paused = true)]
    async fn idle_buckets_are_swept() {
        let limiter = limiter(1, 0.0);
        limiter.check("u1");
        limiter.check("u2");
        assert_eq!(limiter.tracked_keys(), 2);

        tokio::time::advance(Duration::from_secs(61)).await;
        limiter.check("u3");
        limiter.sweep_idle();

        assert_eq!(limiter.tracked_keys(), 1);
    }
}
