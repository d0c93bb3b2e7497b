// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event tags.
//!
//! Tags are ordered string tuples on the wire (`["p", "<pubkey>"]`,
//! `["e", "<id>", "<relay>", "<marker>"]`, ...). The gateway treats them
//! as a thin list with typed constructors for the tuples it emits and
//! accessors for the tuples it reads.

use serde::{Deserialize, Serialize};

/// A single event tag: a non-empty ordered tuple of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(pub Vec<String>);

impl Tag {
    /// `["p", "<pubkey>"]` -- addresses an event to a public key.
    pub fn pubkey(pubkey: impl Into<String>) -> Self {
        Tag(vec!["p".into(), pubkey.into()])
    }

    /// `["e", "<event_id>", "<relay_hint>", "<marker>"]` -- references a
    /// parent event. `relay_hint` is left empty; `marker` is usually
    /// `"reply"` or `"root"`.
    pub fn event(event_id: impl Into<String>, marker: impl Into<String>) -> Self {
        Tag(vec![
            "e".into(),
            event_id.into(),
            String::new(),
            marker.into(),
        ])
    }

    /// `["session", "<id>"]` -- conversation thread identifier on DMs.
    pub fn session(session_id: impl Into<String>) -> Self {
        Tag(vec!["session".into(), session_id.into()])
    }

    /// `["balance", "<sats>"]` -- filterable balance amount on responses.
    pub fn balance(sats: u64) -> Self {
        Tag(vec!["balance".into(), sats.to_string()])
    }

    /// `["amount", "<millisats>"]` -- amount on zap requests/receipts.
    pub fn amount(millisats: u64) -> Self {
        Tag(vec!["amount".into(), millisats.to_string()])
    }

    /// `["bolt11", "<invoice>"]`.
    pub fn bolt11(invoice: impl Into<String>) -> Self {
        Tag(vec!["bolt11".into(), invoice.into()])
    }

    /// `["description", "<json>"]` -- the serialized inner zap request.
    pub fn description(json: impl Into<String>) -> Self {
        Tag(vec!["description".into(), json.into()])
    }

    /// The tag name (first element), if present.
    pub fn name(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// The tag value (second element), if present.
    pub fn value(&self) -> Option<&str> {
        self.0.get(1).map(String::as_str)
    }
}

/// Returns the value of the first tag named `name`, if any.
pub fn first_value<'a>(tags: &'a [Tag], name: &str) -> Option<&'a str> {
    tags.iter()
        .find(|t| t.name() == Some(name))
        .and_then(Tag::value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_serialize_as_string_arrays() {
        let tag = Tag::pubkey("abc");
        assert_eq!(serde_json::to_string(&tag).unwrap(), r#"["p","abc"]"#);

        let reply = Tag::event("e1", "reply");
        assert_eq!(
            serde_json::to_string(&reply).unwrap(),
            r#"["e","e1","","reply"]"#
        );
    }

    #[test]
    fn first_value_finds_named_tag() {
        let tags = vec![
            Tag::pubkey("abc"),
            Tag::session("s1"),
            Tag::session("shadowed"),
        ];
        assert_eq!(first_value(&tags, "session"), Some("s1"));
        assert_eq!(first_value(&tags, "p"), Some("abc"));
        assert_eq!(first_value(&tags, "bolt11"), None);
    }

    #[test]
    fn empty_tag_has_no_name() {
        let tag = Tag(vec![]);
        assert_eq!(tag.name(), None);
        assert_eq!(tag.value(), None);
    }
}
