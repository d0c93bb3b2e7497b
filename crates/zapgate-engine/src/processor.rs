// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The worker body: decrypt/parse, persist, debit, generate, publish,
//! persist.
//!
//! Charging is debit-before-generate: the oracle is only invoked after a
//! successful debit, and there is no refund if generation fails after the
//! debit. Errors after the user message is persisted trigger a DM error
//! notice (DM origin only) and propagate so the work queue retries.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use zapgate_core::{ChatTurn, GatewayError, TurnRole};
use zapgate_ledger::Ledger;
use zapgate_oracle::CircuitBreaker;
use zapgate_proto::{Event, EventKind};
use zapgate_signer::Signer;
use zapgate_store::{
    ConversationStore, Direction, MessageRecord, SaveMessage, SessionOrigin, SessionSeed, Turn,
};

use crate::cache::FingerprintCache;
use crate::dispatcher::PendingEvent;
use crate::outbound::Responder;
use crate::queue::JobHandler;

/// Content-fingerprint dedup window.
const FINGERPRINT_TTL: Duration = Duration::from_secs(300);
const FINGERPRINT_CAPACITY: usize = 1000;

/// Processing tuning.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub dm_cost: u64,
    pub public_cost: u64,
    /// Pause before publishing a response.
    pub response_delay: Duration,
    /// How many records to load from the store.
    pub history_limit: u64,
    /// How many turns actually reach the oracle.
    pub max_history_turns: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            dm_cost: 20,
            public_cost: 50,
            response_delay: Duration::from_secs(2),
            history_limit: 50,
            max_history_turns: 40,
        }
    }
}

/// Handles one admitted event end to end.
pub struct Processor {
    signer: Arc<Signer>,
    store: Arc<ConversationStore>,
    ledger: Arc<Ledger>,
    oracle: Arc<CircuitBreaker>,
    responder: Arc<Responder>,
    fingerprints: FingerprintCache,
    config: ProcessorConfig,
}

impl Processor {
    pub fn new(
        signer: Arc<Signer>,
        store: Arc<ConversationStore>,
        ledger: Arc<Ledger>,
        oracle: Arc<CircuitBreaker>,
        responder: Arc<Responder>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            signer,
            store,
            ledger,
            oracle,
            responder,
            fingerprints: FingerprintCache::new(FINGERPRINT_CAPACITY, FINGERPRINT_TTL),
            config,
        }
    }

    async fn process(&self, job: &PendingEvent) -> Result<(), GatewayError> {
        let event = &job.event;
        let is_dm = event.kind == EventKind::EncryptedDm;

        // Session comes from the DM tag; public notes get one synthesized
        // at persistence time.
        let session_tag = if is_dm {
            event.tag_value("session").map(String::from)
        } else {
            None
        };

        let plaintext = match event.kind {
            EventKind::EncryptedDm => match self.signer.decrypt(&event.pubkey, &event.content) {
                Ok(text) => text,
                Err(e) => {
                    debug!(event_id = %event.id, error = %e, "dropping undecryptable DM");
                    return Ok(());
                }
            },
            EventKind::Text => event.content.clone(),
            _ => return Ok(()),
        };
        let plaintext = plaintext.trim().to_string();
        if plaintext.is_empty() {
            return Ok(());
        }

        if !self.fingerprints.insert_if_fresh(&event.pubkey, &plaintext) {
            debug!(event_id = %event.id, "dropping repeated content fingerprint");
            return Ok(());
        }

        let origin = if is_dm {
            SessionOrigin::Dm
        } else {
            SessionOrigin::Public
        };
        let saved = self
            .store
            .save_message(SaveMessage {
                user_pubkey: event.pubkey.clone(),
                text: plaintext.clone(),
                turn: Turn::User {
                    source_event_id: event.id.clone(),
                    source_event_kind: event.kind.as_u32(),
                },
                timestamp_ms: Some(event.created_at as i64 * 1000),
                session: SessionSeed::new(session_tag.clone(), origin),
                metadata: None,
            })
            .await?;
        if saved.duplicate {
            debug!(event_id = %event.id, "store reported duplicate, dropping");
            return Ok(());
        }

        debug!(
            event_id = %event.id,
            session_id = %saved.session_id,
            relay = %job.relay_url,
            "processing message"
        );

        // Past this point failures owe the user a notice before the queue
        // retry kicks in.
        let result = self
            .respond(event, is_dm, &plaintext, session_tag.is_some(), &saved.session_id, &saved.message_id, origin)
            .await;
        if let Err(e) = &result {
            if is_dm && !e.is_silent_drop() {
                let notice = "Something went wrong while handling your message. I'll retry shortly.";
                if let Err(notice_err) = self
                    .responder
                    .dm(&event.pubkey, Some(&saved.session_id), notice)
                    .await
                {
                    debug!(error = %notice_err, "error notice not delivered");
                }
            }
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn respond(
        &self,
        event: &Event,
        is_dm: bool,
        plaintext: &str,
        session_known: bool,
        session_id: &str,
        user_message_id: &str,
        origin: SessionOrigin,
    ) -> Result<(), GatewayError> {
        let user = &event.pubkey;
        let cost = if is_dm {
            self.config.dm_cost
        } else {
            self.config.public_cost
        };

        // Debit-before-generate gate.
        let new_balance = match self.ledger.debit(user, cost).await {
            Ok(new_balance) => new_balance,
            Err(GatewayError::InsufficientFunds { required, balance }) => {
                info!(user = %user, required, balance, "insufficient balance");
                let text = format!(
                    "Insufficient balance to process this message. Required: {required} sats, \
                     available: {balance} sats. Send a zap to top up."
                );
                self.send_system_reply(event, is_dm, session_id, user_message_id, origin, &text)
                    .await;
                return Ok(());
            }
            Err(GatewayError::DebitRace) => {
                warn!(user = %user, "debit lost an update race, not charging");
                let text = "A temporary accounting error occurred; you were not charged. \
                            Please resend your message.";
                self.send_system_reply(event, is_dm, session_id, user_message_id, origin, text)
                    .await;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        // Bounded conversation context.
        let records = if session_known {
            self.store
                .history_by_session(user, session_id, self.config.history_limit)
                .await?
        } else {
            self.store
                .history_by_user(user, self.config.history_limit)
                .await?
        };
        let history = build_history(&records, user_message_id, self.config.max_history_turns);

        let reply = self.oracle.generate(plaintext, &history).await;

        // Space out replies.
        tokio::time::sleep(self.config.response_delay).await;

        let reply_text = if is_dm {
            let text = format!("{reply}\n\nBalance: {new_balance} sats (cost: {cost} sats)");
            self.responder
                .dm(user, Some(session_id), &text)
                .await?;
            text
        } else {
            self.responder.public_reply(event, &reply).await?;
            reply
        };

        self.store
            .save_message(SaveMessage {
                user_pubkey: user.clone(),
                text: reply_text,
                turn: Turn::Bot {
                    reply_to: Some(user_message_id.to_string()),
                },
                timestamp_ms: None,
                session: SessionSeed::existing(session_id, origin),
                metadata: None,
            })
            .await?;

        if is_dm {
            if let Err(e) = self.responder.balance_snapshot(user, new_balance).await {
                debug!(error = %e, "post-reply balance snapshot not published");
            }
        }

        info!(
            user = %user,
            session_id = %session_id,
            cost,
            new_balance,
            "response published"
        );
        Ok(())
    }

    /// Publishes a gateway notice in the original kind and persists it as
    /// a system record. Publishing is best-effort; persistence is not.
    async fn send_system_reply(
        &self,
        event: &Event,
        is_dm: bool,
        session_id: &str,
        user_message_id: &str,
        origin: SessionOrigin,
        text: &str,
    ) {
        let published = if is_dm {
            self.responder
                .dm(&event.pubkey, Some(session_id), text)
                .await
        } else {
            self.responder.public_reply(event, text).await
        };
        if let Err(e) = published {
            debug!(error = %e, "system reply not published");
        }

        let saved = self
            .store
            .save_message(SaveMessage {
                user_pubkey: event.pubkey.clone(),
                text: text.to_string(),
                turn: Turn::System {
                    reply_to: Some(user_message_id.to_string()),
                },
                timestamp_ms: None,
                session: SessionSeed::existing(session_id, origin),
                metadata: None,
            })
            .await;
        if let Err(e) = saved {
            warn!(error = %e, "system reply not persisted");
        }
    }
}

#[async_trait]
impl JobHandler<PendingEvent> for Processor {
    async fn run(&self, job: &PendingEvent) -> Result<(), GatewayError> {
        self.process(job).await
    }
}

/// Maps stored records to oracle turns: the current message is excluded,
/// and long histories are truncated to the most recent turns with a short
/// summary hint in place of what was dropped.
///
/// The oracle's messages array must open with a user turn, so the hint is
/// a user turn and a window that opens mid-exchange gets a user lead-in.
fn build_history(
    records: &[MessageRecord],
    current_message_id: &str,
    max_turns: usize,
) -> Vec<ChatTurn> {
    let mut turns: Vec<ChatTurn> = records
        .iter()
        .filter(|r| r.message_id != current_message_id)
        .map(|r| match r.turn.direction() {
            Direction::User => ChatTurn::user(r.text.clone()),
            Direction::Bot => ChatTurn::assistant(r.text.clone()),
        })
        .collect();

    if turns.len() > max_turns {
        let omitted = turns.len() - max_turns;
        turns.drain(..omitted);
        turns.insert(
            0,
            ChatTurn::user(format!(
                "(Earlier context: {omitted} older messages in this conversation were omitted.)"
            )),
        );
    } else if matches!(turns.first(), Some(turn) if turn.role == TurnRole::Assistant) {
        turns.insert(
            0,
            ChatTurn::user("(Earlier messages in this conversation were omitted.)"),
        );
    }
    turns
}
