// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subscription filters sent with `REQ` frames.

use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::kind::EventKind;

/// A relay subscription filter. All present conditions must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub kinds: Option<Vec<EventKind>>,

    /// `#p` tag values: events addressed to these public keys.
    #[serde(rename = "#p", skip_serializing_if = "Option::is_none")]
    pub p_tags: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

impl Filter {
    /// The gateway's standing subscription: watched kinds, addressed to
    /// `self_pubkey`, from `since` onward.
    pub fn addressed_to(self_pubkey: impl Into<String>, since: u64) -> Self {
        Filter {
            kinds: Some(vec![
                EventKind::Text,
                EventKind::EncryptedDm,
                EventKind::Balance,
                EventKind::ZapReceipt,
            ]),
            p_tags: Some(vec![self_pubkey.into()]),
            since: Some(since),
            ..Filter::default()
        }
    }

    /// Whether `event` satisfies every present condition.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.iter().any(|id| *id == event.id) {
                return false;
            }
        }
        if let Some(authors) = &self.authors {
            if !authors.iter().any(|a| *a == event.pubkey) {
                return false;
            }
        }
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&event.kind) {
                return false;
            }
        }
        if let Some(p_tags) = &self.p_tags {
            let addressed = event
                .tags
                .iter()
                .filter(|t| t.name() == Some("p"))
                .filter_map(|t| t.value())
                .any(|v| p_tags.iter().any(|p| p == v));
            if !addressed {
                return false;
            }
        }
        if let Some(since) = self.since {
            if event.created_at < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if event.created_at > until {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventDraft;
    use crate::tag::Tag;

    fn event(kind: EventKind, created_at: u64, p: &str) -> Event {
        EventDraft::new("author", created_at, kind, vec![Tag::pubkey(p)], "hi")
            .into_event(String::new())
    }

    #[test]
    fn standing_filter_serializes_p_tag_field() {
        let filter = Filter::addressed_to("me", 1000);
        let json = serde_json::to_string(&filter).unwrap();
        assert!(json.contains(r##""#p":["me"]"##), "got: {json}");
        assert!(json.contains(r#""kinds":[1,4,1006,9735]"#), "got: {json}");
        assert!(!json.contains("until"), "absent fields omitted: {json}");
    }

    #[test]
    fn matches_addressed_kind_and_since() {
        let filter = Filter::addressed_to("me", 1000);
        assert!(filter.matches(&event(EventKind::EncryptedDm, 1500, "me")));
        // Wrong recipient.
        assert!(!filter.matches(&event(EventKind::EncryptedDm, 1500, "you")));
        // Too old.
        assert!(!filter.matches(&event(EventKind::EncryptedDm, 500, "me")));
        // Unwatched kind.
        assert!(!filter.matches(&event(EventKind::Unknown(7), 1500, "me")));
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = Filter::default();
        assert!(filter.matches(&event(EventKind::Text, 1, "anyone")));
    }
}
