// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event kinds the gateway consumes and produces.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// The kinds of event this gateway understands.
///
/// Kinds outside this set deserialize as [`EventKind::Unknown`] and are
/// ignored by the dispatcher rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Public broadcast note (kind 1).
    Text,
    /// Encrypted direct message (kind 4).
    EncryptedDm,
    /// Balance request inbound / balance response outbound (kind 1006).
    Balance,
    /// Payment receipt attesting a paid invoice (kind 9735).
    ZapReceipt,
    /// Any kind the gateway does not handle.
    Unknown(u32),
}

impl EventKind {
    pub fn as_u32(self) -> u32 {
        match self {
            EventKind::Text => 1,
            EventKind::EncryptedDm => 4,
            EventKind::Balance => 1006,
            EventKind::ZapReceipt => 9735,
            EventKind::Unknown(k) => k,
        }
    }
}

impl From<u32> for EventKind {
    fn from(kind: u32) -> Self {
        match kind {
            1 => EventKind::Text,
            4 => EventKind::EncryptedDm,
            1006 => EventKind::Balance,
            9735 => EventKind::ZapReceipt,
            other => EventKind::Unknown(other),
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.as_u32())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = u64::deserialize(deserializer)?;
        let kind = u32::try_from(raw).map_err(|_| {
            de::Error::custom(format!("event kind {raw} out of range"))
        })?;
        Ok(EventKind::from(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_kinds_round_trip_as_numbers() {
        for (kind, num) in [
            (EventKind::Text, 1u32),
            (EventKind::EncryptedDm, 4),
            (EventKind::Balance, 1006),
            (EventKind::ZapReceipt, 9735),
        ] {
            assert_eq!(kind.as_u32(), num);
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, num.to_string());
            let back: EventKind = serde_json::from_str(&json).unwrap();
            assert_eq!(back, kind);
        }
    }

    #[test]
    fn unknown_kind_is_preserved() {
        let kind: EventKind = serde_json::from_str("30023").unwrap();
        assert_eq!(kind, EventKind::Unknown(30023));
        assert_eq!(serde_json::to_string(&kind).unwrap(), "30023");
    }
}
