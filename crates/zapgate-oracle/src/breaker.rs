// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Circuit breaker around the AI oracle.
//!
//! Closed: calls pass through; `failure_threshold` consecutive failures
//! open the circuit. Open: calls short-circuit to the fallback string
//! without contacting the oracle until `reset_timeout` elapses. HalfOpen:
//! a single probe call is allowed; `success_threshold` successes close the
//! circuit, one failure reopens it. Each underlying call also races a hard
//! timeout that counts as a failure.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use zapgate_core::{ChatTurn, Oracle};

/// Circuit breaker tuning.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub call_timeout: Duration,
    pub reset_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 1,
            call_timeout: Duration::from_secs(55),
            reset_timeout: Duration::from_secs(30),
        }
    }
}

/// Breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

/// Wraps an [`Oracle`] so provider failures degrade to a fallback string
/// instead of reaching users.
pub struct CircuitBreaker {
    oracle: Arc<dyn Oracle>,
    config: BreakerConfig,
    fallback: String,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(oracle: Arc<dyn Oracle>, config: BreakerConfig, fallback: String) -> Self {
        Self {
            oracle,
            config,
            fallback,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                opened_at: None,
                probe_in_flight: false,
            }),
        }
    }

    /// Current state, with the time-based Open -> HalfOpen transition
    /// applied for observation.
    pub fn state(&self) -> CircuitState {
        let inner = self.inner.lock().expect("breaker lock poisoned");
        match (inner.state, inner.opened_at) {
            (CircuitState::Open, Some(opened_at))
                if opened_at.elapsed() >= self.config.reset_timeout =>
            {
                CircuitState::HalfOpen
            }
            (state, _) => state,
        }
    }

    /// Generates a response, or returns the fallback string when the
    /// circuit is open or the call fails.
    pub async fn generate(&self, prompt: &str, history: &[ChatTurn]) -> String {
        if !self.try_acquire() {
            debug!("circuit open, returning fallback without oracle call");
            return self.fallback.clone();
        }

        let result = tokio::time::timeout(
            self.config.call_timeout,
            self.oracle.generate(prompt, history),
        )
        .await;

        match result {
            Ok(Ok(text)) => {
                self.record_success();
                text
            }
            Ok(Err(e)) => {
                warn!(error = %e, "oracle call failed");
                self.record_failure();
                self.fallback.clone()
            }
            Err(_elapsed) => {
                warn!(timeout = ?self.config.call_timeout, "oracle call timed out");
                self.record_failure();
                self.fallback.clone()
            }
        }
    }

    /// The fallback string returned while the circuit is open.
    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    fn try_acquire(&self) -> bool {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.config.reset_timeout {
                    debug!("reset timeout elapsed, probing half-open");
                    inner.state = CircuitState::HalfOpen;
                    inner.consecutive_successes = 0;
                    inner.probe_in_flight = true;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    false
                } else {
                    inner.probe_in_flight = true;
                    true
                }
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                inner.probe_in_flight = false;
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.success_threshold {
                    debug!("circuit closing after successful probe");
                    inner.state = CircuitState::Closed;
                    inner.consecutive_failures = 0;
                    inner.consecutive_successes = 0;
                    inner.opened_at = None;
                }
            }
            CircuitState::Open => {
                // A late success from a call that started before the
                // circuit opened; leave the open state alone.
            }
        }
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        failures = inner.consecutive_failures,
                        "failure threshold reached, opening circuit"
                    );
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            CircuitState::HalfOpen => {
                warn!("half-open probe failed, reopening circuit");
                inner.probe_in_flight = false;
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.consecutive_successes = 0;
            }
            CircuitState::Open => {}
        }
    }
}
