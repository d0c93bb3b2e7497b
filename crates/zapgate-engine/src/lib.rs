// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Zapgate processing engine.
//!
//! Events flow from the relay supervisor into the [`Dispatcher`], which
//! deduplicates, rate-limits, and classifies them. DMs and public
//! mentions land on the bounded [`WorkQueue`] and are handled by the
//! [`Processor`]: decrypt, persist, debit, generate, publish, persist.
//! Zap receipts and balance queries bypass the queue through the
//! [`PaymentGate`].

pub mod cache;
pub mod dispatcher;
pub mod limiter;
pub mod outbound;
pub mod payments;
pub mod processor;
pub mod queue;
pub mod stats;

pub use cache::{FingerprintCache, ProcessedEventCache};
pub use dispatcher::{Dispatcher, PendingEvent};
pub use limiter::{RateDecision, RateLimiter, RateLimiterConfig};
pub use outbound::Responder;
pub use payments::PaymentGate;
pub use processor::{Processor, ProcessorConfig};
pub use queue::{JobHandler, QueueConfig, QueueSnapshot, WorkQueue};
pub use stats::{EngineSnapshot, EngineStats};
