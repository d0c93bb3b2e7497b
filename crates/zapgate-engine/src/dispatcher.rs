// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The inbound dispatcher: classify, deduplicate, and admit events.
//!
//! Runs inline on the relay-receive path and never blocks it: dedup and
//! rate-limit checks are O(1), the queue enqueue is non-blocking, and the
//! one-shot notices are fire-and-forget.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use zapgate_proto::{Event, EventKind};

use crate::cache::ProcessedEventCache;
use crate::limiter::{RateDecision, RateLimiter};
use crate::outbound::Responder;
use crate::payments::PaymentGate;
use crate::queue::WorkQueue;
use crate::stats::EngineStats;

/// A unit of work admitted to the queue.
#[derive(Debug, Clone)]
pub struct PendingEvent {
    pub event: Event,
    pub relay_url: String,
}

/// Consumes relay events and routes them by kind.
pub struct Dispatcher {
    self_pubkey: String,
    seen: ProcessedEventCache,
    limiter: Arc<RateLimiter>,
    queue: WorkQueue<PendingEvent>,
    payments: Arc<PaymentGate>,
    responder: Arc<Responder>,
    stats: Arc<EngineStats>,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        self_pubkey: String,
        seen_capacity: usize,
        limiter: Arc<RateLimiter>,
        queue: WorkQueue<PendingEvent>,
        payments: Arc<PaymentGate>,
        responder: Arc<Responder>,
        stats: Arc<EngineStats>,
    ) -> Self {
        Self {
            self_pubkey,
            seen: ProcessedEventCache::new(seen_capacity),
            limiter,
            queue,
            payments,
            responder,
            stats,
        }
    }

    /// Consumes the relay event channel until cancellation. The binary
    /// forwards the supervisor's `(event, relay_url)` pairs into this
    /// channel as [`PendingEvent`]s.
    pub async fn run(
        &self,
        mut events_rx: UnboundedReceiver<PendingEvent>,
        cancel: CancellationToken,
    ) {
        info!("dispatcher running");
        loop {
            tokio::select! {
                incoming = events_rx.recv() => {
                    match incoming {
                        Some(incoming) => {
                            self.dispatch(incoming.event, incoming.relay_url).await;
                        }
                        None => break,
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
        info!("dispatcher stopped");
    }

    /// Routes a single event. Public for direct-drive tests.
    pub async fn dispatch(&self, event: Event, relay_url: String) {
        if !self.seen.insert(&event.id) {
            self.stats.record_duplicate();
            return;
        }
        if event.pubkey == self.self_pubkey {
            self.stats.record_own_event();
            return;
        }

        match event.kind {
            EventKind::ZapReceipt => self.payments.handle_receipt(&event).await,
            EventKind::Balance => self.payments.handle_balance_request(&event).await,
            EventKind::EncryptedDm | EventKind::Text => self.admit(event, relay_url).await,
            EventKind::Unknown(kind) => {
                debug!(kind, event_id = %event.id, "ignoring unhandled event kind");
                self.stats.record_ignored_kind();
            }
        }
    }

    async fn admit(&self, event: Event, relay_url: String) {
        let is_dm = event.kind == EventKind::EncryptedDm;
        let author = event.pubkey.clone();
        let session = event.tag_value("session").map(String::from);

        if let RateDecision::Denied { retry_after_secs } = self.limiter.check(&author) {
            self.stats.record_rate_limited();
            debug!(author = %author, retry_after_secs, "rate limited");
            if is_dm {
                // One-shot decline; public over-rate events get no signal.
                let text = format!(
                    "You're sending messages too quickly. Please retry in {retry_after_secs} seconds."
                );
                if let Err(e) = self.responder.dm(&author, session.as_deref(), &text).await {
                    debug!(error = %e, "rate-limit notice not delivered");
                }
            }
            return;
        }

        if self.queue.enqueue(PendingEvent { event, relay_url }).is_err() {
            self.stats.record_queue_rejected();
            debug!(author = %author, "work queue full, dropping event");
            if is_dm {
                let text = "The gateway is overloaded right now. Please try again in a moment.";
                if let Err(e) = self.responder.dm(&author, session.as_deref(), text).await {
                    debug!(error = %e, "overload notice not delivered");
                }
            }
        }
    }
}
