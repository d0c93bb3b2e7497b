// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisted record types for the conversation store.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Who produced a message. Used as a key segment, so the string forms
/// (`user` / `bot`) are part of the storage layout.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    User,
    Bot,
}

/// Where a session originated.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionOrigin {
    Dm,
    Public,
    Other,
}

/// The variant part of a message record. Fields required by each variant
/// live on the variant rather than as ad-hoc optionals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "turn", rename_all = "snake_case")]
pub enum Turn {
    /// An inbound user question; always anchored to a wire event.
    User {
        source_event_id: String,
        source_event_kind: u32,
    },
    /// A generated bot response, linked to the user message it answers.
    Bot { reply_to: Option<String> },
    /// A gateway-originated notice (insufficient funds, transient errors).
    System { reply_to: Option<String> },
}

impl Turn {
    pub fn direction(&self) -> Direction {
        match self {
            Turn::User { .. } => Direction::User,
            Turn::Bot { .. } | Turn::System { .. } => Direction::Bot,
        }
    }

    /// The message type label: question, response, or system.
    pub fn type_label(&self) -> &'static str {
        match self {
            Turn::User { .. } => "question",
            Turn::Bot { .. } => "response",
            Turn::System { .. } => "system",
        }
    }

    pub fn source_event_id(&self) -> Option<&str> {
        match self {
            Turn::User {
                source_event_id, ..
            } => Some(source_event_id),
            _ => None,
        }
    }
}

/// The persisted conversational atom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub user_pubkey: String,
    pub session_id: String,
    /// Originating event id for user turns, synthetic uuid otherwise.
    pub message_id: String,
    pub text: String,
    pub timestamp_ms: i64,
    #[serde(flatten)]
    pub turn: Turn,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// A logical conversation thread scoped to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_pubkey: String,
    pub session_id: String,
    pub created_at_ms: i64,
    pub last_message_at_ms: i64,
    pub message_count: u64,
    pub origin: SessionOrigin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub last_preview: String,
    pub last_direction: Direction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_strings_are_key_segments() {
        assert_eq!(Direction::User.to_string(), "user");
        assert_eq!(Direction::Bot.to_string(), "bot");
        assert_eq!("user".parse::<Direction>().unwrap(), Direction::User);
    }

    #[test]
    fn turn_variants_map_to_direction_and_type() {
        let user = Turn::User {
            source_event_id: "e1".into(),
            source_event_kind: 4,
        };
        assert_eq!(user.direction(), Direction::User);
        assert_eq!(user.type_label(), "question");
        assert_eq!(user.source_event_id(), Some("e1"));

        let bot = Turn::Bot { reply_to: None };
        assert_eq!(bot.direction(), Direction::Bot);
        assert_eq!(bot.type_label(), "response");

        let system = Turn::System {
            reply_to: Some("m1".into()),
        };
        assert_eq!(system.direction(), Direction::Bot);
        assert_eq!(system.type_label(), "system");
        assert_eq!(system.source_event_id(), None);
    }

    #[test]
    fn message_record_json_flattens_turn_tag() {
        let record = MessageRecord {
            user_pubkey: "u1".into(),
            session_id: "s1".into(),
            message_id: "e1".into(),
            text: "hello".into(),
            timestamp_ms: 1000,
            turn: Turn::User {
                source_event_id: "e1".into(),
                source_event_kind: 4,
            },
            metadata: None,
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#""turn":"user""#), "got: {json}");
        assert!(json.contains(r#""source_event_kind":4"#), "got: {json}");

        let back: MessageRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn session_record_round_trips() {
        let session = SessionRecord {
            user_pubkey: "u1".into(),
            session_id: "s1".into(),
            created_at_ms: 1000,
            last_message_at_ms: 2000,
            message_count: 3,
            origin: SessionOrigin::Dm,
            label: None,
            last_preview: "hey".into(),
            last_direction: Direction::Bot,
            last_event_id: Some("e2".into()),
        };
        let json = serde_json::to_string(&session).unwrap();
        let back: SessionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, session);
    }
}
