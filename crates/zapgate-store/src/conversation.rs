// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The conversation store: an append-only message log keyed by user and
//! session, with duplicate suppression and history retrieval.
//!
//! Key layout (lexicographic order equals time order because timestamps
//! are zero-padded to 13 digits):
//!
//! ```text
//! message:{user}:{session}:{padded_ts}:{direction}[:{event_id12}] -> MessageRecord
//! session:{user}:{session}                                        -> SessionRecord
//! hash:event:{event_id}                                           -> message key
//! hash:{user}:{session}:{padded_ts}:{direction}[:{event_id12}]    -> message key
//! ```
//!
//! User turns carry a short event-id segment: their timestamps come from
//! the wire `created_at`, which is second-resolution, and two distinct
//! events from one user in the same second must not alias to one key.
//! Bot turns are stamped with true millisecond precision and need no
//! disambiguator.
//!
//! `save_message` runs as one closure on the single connection thread, so
//! the check-then-write against the hash keys cannot interleave with a
//! concurrent save.

use std::collections::BTreeMap;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use zapgate_core::GatewayError;

use crate::kv::{self, map_tr_err, SqliteKv};
use crate::records::{Direction, MessageRecord, SessionOrigin, SessionRecord, Turn};

const SESSION_ID_MAX_LEN: usize = 120;
const PREVIEW_MAX_LEN: usize = 120;

/// How the caller wants the session resolved.
#[derive(Debug, Clone)]
pub struct SessionSeed {
    /// Externally provided session id (DM `session` tag), if any.
    pub requested_id: Option<String>,
    pub origin: SessionOrigin,
    pub label: Option<String>,
}

impl SessionSeed {
    pub fn new(requested_id: Option<String>, origin: SessionOrigin) -> Self {
        Self {
            requested_id,
            origin,
            label: None,
        }
    }

    /// Resolution for a known, already-persisted session id.
    pub fn existing(session_id: impl Into<String>, origin: SessionOrigin) -> Self {
        Self {
            requested_id: Some(session_id.into()),
            origin,
            label: None,
        }
    }
}

/// Input to [`ConversationStore::save_message`].
#[derive(Debug, Clone)]
pub struct SaveMessage {
    pub user_pubkey: String,
    pub text: String,
    pub turn: Turn,
    /// Explicit timestamp; `None` means now.
    pub timestamp_ms: Option<i64>,
    pub session: SessionSeed,
    pub metadata: Option<serde_json::Value>,
}

/// Result of a save: the resolved ids and whether the write was suppressed.
#[derive(Debug, Clone)]
pub struct SaveOutcome {
    pub message_id: String,
    pub session_id: String,
    pub duplicate: bool,
    pub timestamp_ms: i64,
}

/// Per-user aggregate for the dashboard read surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub user_pubkey: String,
    pub sessions: u64,
    pub messages: u64,
    pub last_message_at_ms: i64,
    pub last_preview: String,
}

/// Append-only conversation log over [`SqliteKv`].
#[derive(Clone)]
pub struct ConversationStore {
    kv: SqliteKv,
}

impl ConversationStore {
    pub fn new(kv: SqliteKv) -> Self {
        Self { kv }
    }

    /// Resolves (or creates) a session for `user`, returning the id and
    /// whether it was newly created. Metadata upgrades are idempotent.
    pub async fn ensure_session(
        &self,
        user: &str,
        seed: SessionSeed,
    ) -> Result<(String, bool), GatewayError> {
        let user = user.to_string();
        let now_ms = now_ms();
        let candidate = resolve_session_id(&seed, now_ms);

        self.kv
            .connection()
            .call(move |conn| {
                let (session, is_new) =
                    ensure_session_sync(conn, &user, &candidate, &seed, now_ms)?;
                Ok((session.session_id, is_new))
            })
            .await
            .map_err(map_tr_err)
    }

    /// Persists one message, suppressing duplicates by event id and by
    /// composite key. Returns the resolved session id.
    pub async fn save_message(&self, msg: SaveMessage) -> Result<SaveOutcome, GatewayError> {
        let ts = msg.timestamp_ms.unwrap_or_else(now_ms);
        let candidate = resolve_session_id(&msg.session, ts);

        self.kv
            .connection()
            .call(move |conn| {
                let (session, _is_new) =
                    ensure_session_sync(conn, &msg.user_pubkey, &candidate, &msg.session, ts)?;
                let session_id = session.session_id.clone();
                let direction = msg.turn.direction();

                let message_id = match msg.turn.source_event_id() {
                    Some(event_id) => event_id.to_string(),
                    None => uuid::Uuid::new_v4().to_string(),
                };

                let disambig = msg.turn.source_event_id().map(short_event_id);
                let message_key = message_key(
                    &msg.user_pubkey,
                    &session_id,
                    ts,
                    direction,
                    disambig.as_deref(),
                );
                let composite_key = composite_hash_key(
                    &msg.user_pubkey,
                    &session_id,
                    ts,
                    direction,
                    disambig.as_deref(),
                );
                let event_key = msg.turn.source_event_id().map(event_hash_key);

                // Duplicate suppression: either pointer already present
                // means this message was stored before.
                if let Some(key) = &event_key {
                    if kv::get_sync(conn, key)?.is_some() {
                        return Ok(SaveOutcome {
                            message_id,
                            session_id,
                            duplicate: true,
                            timestamp_ms: ts,
                        });
                    }
                }
                if kv::get_sync(conn, &composite_key)?.is_some() {
                    return Ok(SaveOutcome {
                        message_id,
                        session_id,
                        duplicate: true,
                        timestamp_ms: ts,
                    });
                }

                let record = MessageRecord {
                    user_pubkey: msg.user_pubkey.clone(),
                    session_id: session_id.clone(),
                    message_id: message_id.clone(),
                    text: msg.text.clone(),
                    timestamp_ms: ts,
                    turn: msg.turn.clone(),
                    metadata: msg.metadata.clone(),
                };
                let encoded = serde_json::to_string(&record)
                    .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;

                kv::put_sync(conn, &message_key, &encoded)?;
                kv::put_sync(conn, &composite_key, &message_key)?;
                if let Some(key) = &event_key {
                    kv::put_sync(conn, key, &message_key)?;
                }

                let mut session = session;
                session.message_count += 1;
                session.last_message_at_ms = session.last_message_at_ms.max(ts);
                session.last_preview = preview(&msg.text);
                session.last_direction = direction;
                if let Some(event_id) = msg.turn.source_event_id() {
                    session.last_event_id = Some(event_id.to_string());
                }
                let session_encoded = serde_json::to_string(&session)
                    .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
                kv::put_sync(
                    conn,
                    &session_key(&msg.user_pubkey, &session_id),
                    &session_encoded,
                )?;

                Ok(SaveOutcome {
                    message_id,
                    session_id,
                    duplicate: false,
                    timestamp_ms: ts,
                })
            })
            .await
            .map_err(map_tr_err)
    }

    /// Last `limit` messages for `user` across all sessions, oldest first.
    pub async fn history_by_user(
        &self,
        user: &str,
        limit: u64,
    ) -> Result<Vec<MessageRecord>, GatewayError> {
        self.scan_messages(&format!("message:{user}:"), limit).await
    }

    /// Last `limit` messages of one session, oldest first.
    pub async fn history_by_session(
        &self,
        user: &str,
        session_id: &str,
        limit: u64,
    ) -> Result<Vec<MessageRecord>, GatewayError> {
        self.scan_messages(&format!("message:{user}:{session_id}:"), limit)
            .await
    }

    /// Most recent messages across every user (dashboard read), oldest first.
    pub async fn recent_all(&self, limit: u64) -> Result<Vec<MessageRecord>, GatewayError> {
        let rows = self.kv.scan_prefix("message:", true, Some(limit)).await?;
        let mut records = parse_records(rows);
        records.sort_by_key(|r| r.timestamp_ms);
        Ok(records)
    }

    /// Per-user aggregates from the session records (dashboard read).
    pub async fn summary_all(&self) -> Result<Vec<UserSummary>, GatewayError> {
        let rows = self.kv.scan_prefix("session:", false, None).await?;
        let mut by_user: BTreeMap<String, UserSummary> = BTreeMap::new();

        for (_key, value) in rows {
            let session: SessionRecord = match serde_json::from_str(&value) {
                Ok(s) => s,
                Err(e) => {
                    debug!(error = %e, "skipping malformed session record");
                    continue;
                }
            };
            let entry = by_user
                .entry(session.user_pubkey.clone())
                .or_insert_with(|| UserSummary {
                    user_pubkey: session.user_pubkey.clone(),
                    sessions: 0,
                    messages: 0,
                    last_message_at_ms: 0,
                    last_preview: String::new(),
                });
            entry.sessions += 1;
            entry.messages += session.message_count;
            if session.last_message_at_ms >= entry.last_message_at_ms {
                entry.last_message_at_ms = session.last_message_at_ms;
                entry.last_preview = session.last_preview.clone();
            }
        }

        Ok(by_user.into_values().collect())
    }

    /// Fetches a session record, if present.
    pub async fn session(
        &self,
        user: &str,
        session_id: &str,
    ) -> Result<Option<SessionRecord>, GatewayError> {
        match self.kv.get(&session_key(user, session_id)).await? {
            Some(value) => serde_json::from_str(&value)
                .map(Some)
                .map_err(|e| GatewayError::Parse(format!("session record: {e}"))),
            None => Ok(None),
        }
    }

    async fn scan_messages(
        &self,
        prefix: &str,
        limit: u64,
    ) -> Result<Vec<MessageRecord>, GatewayError> {
        let rows = self.kv.scan_prefix(prefix, true, Some(limit)).await?;
        let mut records = parse_records(rows);
        records.reverse();
        Ok(records)
    }
}

fn parse_records(rows: Vec<(String, String)>) -> Vec<MessageRecord> {
    rows.into_iter()
        .filter_map(|(key, value)| match serde_json::from_str(&value) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!(key, error = %e, "skipping malformed message record");
                None
            }
        })
        .collect()
}

fn ensure_session_sync(
    conn: &rusqlite::Connection,
    user: &str,
    candidate_id: &str,
    seed: &SessionSeed,
    now_ms: i64,
) -> Result<(SessionRecord, bool), tokio_rusqlite::Error> {
    let key = session_key(user, candidate_id);
    if let Some(existing) = kv::get_sync(conn, &key)? {
        let mut session: SessionRecord = serde_json::from_str(&existing)
            .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;

        // Idempotent metadata upgrades only; origin Other is a placeholder.
        let mut changed = false;
        if session.origin == SessionOrigin::Other && seed.origin != SessionOrigin::Other {
            session.origin = seed.origin;
            changed = true;
        }
        if session.label.is_none() && seed.label.is_some() {
            session.label = seed.label.clone();
            changed = true;
        }
        if changed {
            let encoded = serde_json::to_string(&session)
                .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
            kv::put_sync(conn, &key, &encoded)?;
        }
        return Ok((session, false));
    }

    let session = SessionRecord {
        user_pubkey: user.to_string(),
        session_id: candidate_id.to_string(),
        created_at_ms: now_ms,
        last_message_at_ms: now_ms,
        message_count: 0,
        origin: seed.origin,
        label: seed.label.clone(),
        last_preview: String::new(),
        last_direction: Direction::User,
        last_event_id: None,
    };
    let encoded = serde_json::to_string(&session)
        .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
    kv::put_sync(conn, &key, &encoded)?;
    Ok((session, true))
}

/// Sanitized requested id, or a synthetic `session-{ts}-{random8}`.
fn resolve_session_id(seed: &SessionSeed, ts_ms: i64) -> String {
    seed.requested_id
        .as_deref()
        .and_then(sanitize_session_id)
        .unwrap_or_else(|| {
            let suffix: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(8)
                .map(char::from)
                .collect();
            format!("session-{ts_ms}-{suffix}")
        })
}

/// Trims, collapses whitespace runs, strips non-printable characters and
/// the `:` key separator, and caps length. Returns `None` when nothing
/// usable remains.
fn sanitize_session_id(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len().min(SESSION_ID_MAX_LEN));
    let mut last_was_space = true;
    for c in raw.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
            continue;
        }
        if c.is_control() || c == ':' {
            continue;
        }
        out.push(c);
        last_was_space = false;
    }
    let trimmed = out.trim_end();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(SESSION_ID_MAX_LEN).collect())
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_MAX_LEN).collect()
}

fn message_key(
    user: &str,
    session: &str,
    ts_ms: i64,
    direction: Direction,
    disambig: Option<&str>,
) -> String {
    match disambig {
        Some(d) => format!("message:{user}:{session}:{ts_ms:013}:{direction}:{d}"),
        None => format!("message:{user}:{session}:{ts_ms:013}:{direction}"),
    }
}

fn session_key(user: &str, session: &str) -> String {
    format!("session:{user}:{session}")
}

fn event_hash_key(event_id: &str) -> String {
    format!("hash:event:{event_id}")
}

fn composite_hash_key(
    user: &str,
    session: &str,
    ts_ms: i64,
    direction: Direction,
    disambig: Option<&str>,
) -> String {
    match disambig {
        Some(d) => format!("hash:{user}:{session}:{ts_ms:013}:{direction}:{d}"),
        None => format!("hash:{user}:{session}:{ts_ms:013}:{direction}"),
    }
}

/// Short key segment from an event id; 12 hex chars are plenty to keep
/// same-second events from one author apart.
fn short_event_id(event_id: &str) -> String {
    event_id.chars().take(12).collect()
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
