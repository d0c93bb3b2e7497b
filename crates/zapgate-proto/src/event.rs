// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The signed event record and its unsigned draft form.

use bitcoin_hashes::{sha256, Hash};
use serde::{Deserialize, Serialize};

use crate::kind::EventKind;
use crate::tag::{self, Tag};
use crate::ProtoError;

/// A signed, immutable event as it appears on the wire.
///
/// `id` is the lowercase hex sha256 of the canonical serialization
/// `[0, pubkey, created_at, kind, tags, content]`; `sig` is a 64-byte hex
/// schnorr signature over `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// 32-byte lowercase hex content hash.
    pub id: String,
    /// 32-byte lowercase hex x-only public key of the author.
    pub pubkey: String,
    /// Unix timestamp in seconds.
    pub created_at: u64,
    pub kind: EventKind,
    pub tags: Vec<Tag>,
    /// Opaque string; NIP-04 ciphertext for DM kind.
    pub content: String,
    /// 64-byte hex schnorr signature of `id`.
    pub sig: String,
}

impl Event {
    pub fn from_json(data: &str) -> Result<Self, ProtoError> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn to_json(&self) -> String {
        // Serialization of plain strings and integers cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Value of the first tag named `name`.
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        tag::first_value(&self.tags, name)
    }

    /// Recomputes the content hash and compares it to `id`.
    pub fn has_valid_id(&self) -> bool {
        compute_id(
            &self.pubkey,
            self.created_at,
            self.kind,
            &self.tags,
            &self.content,
        ) == self.id
    }
}

/// An event before signing: everything but `id` and `sig`.
///
/// The signer computes the id, signs it, and produces the final [`Event`].
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub pubkey: String,
    pub created_at: u64,
    pub kind: EventKind,
    pub tags: Vec<Tag>,
    pub content: String,
}

impl EventDraft {
    pub fn new(
        pubkey: impl Into<String>,
        created_at: u64,
        kind: EventKind,
        tags: Vec<Tag>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            pubkey: pubkey.into(),
            created_at,
            kind,
            tags,
            content: content.into(),
        }
    }

    /// The content hash this draft will carry once signed.
    pub fn id(&self) -> String {
        compute_id(
            &self.pubkey,
            self.created_at,
            self.kind,
            &self.tags,
            &self.content,
        )
    }

    /// Finalizes the draft with a signature produced over [`EventDraft::id`].
    pub fn into_event(self, sig: String) -> Event {
        let id = self.id();
        Event {
            id,
            pubkey: self.pubkey,
            created_at: self.created_at,
            kind: self.kind,
            tags: self.tags,
            content: self.content,
            sig,
        }
    }
}

/// Lowercase hex sha256 of the canonical event array
/// `[0, pubkey, created_at, kind, tags, content]`.
fn compute_id(
    pubkey: &str,
    created_at: u64,
    kind: EventKind,
    tags: &[Tag],
    content: &str,
) -> String {
    let canonical = serde_json::json!([0, pubkey, created_at, kind.as_u32(), tags, content]);
    let data = canonical.to_string();
    sha256::Hash::hash(data.as_bytes()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_draft() -> EventDraft {
        EventDraft::new(
            "02c7e1b1e9c175ab2d100baf1d5a66e73ecc044e9f8093d0c965741f26aa3abf",
            1_673_002_822,
            EventKind::Text,
            vec![Tag::pubkey("abc"), Tag::event("parent", "reply")],
            "Lorem ipsum dolor sit amet",
        )
    }

    #[test]
    fn draft_id_is_64_hex_chars() {
        let id = sample_draft().id();
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn draft_id_is_deterministic_and_content_sensitive() {
        let a = sample_draft().id();
        let b = sample_draft().id();
        assert_eq!(a, b);

        let mut changed = sample_draft();
        changed.content = "different".into();
        assert_ne!(a, changed.id());
    }

    #[test]
    fn draft_id_is_tag_order_sensitive() {
        let mut reordered = sample_draft();
        reordered.tags.reverse();
        assert_ne!(sample_draft().id(), reordered.id());
    }

    #[test]
    fn event_round_trips_through_json() {
        let event = sample_draft().into_event("00".repeat(64));
        let json = event.to_json();
        let back = Event::from_json(&json).unwrap();
        assert_eq!(event, back);
        assert!(back.has_valid_id());
    }

    #[test]
    fn tampered_event_fails_id_check() {
        let mut event = sample_draft().into_event("00".repeat(64));
        event.content.push('!');
        assert!(!event.has_valid_id());
    }

    #[test]
    fn tag_value_reads_first_match() {
        let mut draft = sample_draft();
        draft.tags.push(Tag::session("thread-1"));
        let event = draft.into_event(String::new());
        assert_eq!(event.tag_value("session"), Some("thread-1"));
        assert_eq!(event.tag_value("p"), Some("abc"));
        assert_eq!(event.tag_value("bolt11"), None);
    }

    #[test]
    fn kind_serializes_as_integer_in_event_json() {
        let event = sample_draft().into_event(String::new());
        let value: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(value["kind"], 1);
    }
}
