// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Zap receipt parsing.
//!
//! A receipt (kind 9735) carries a `bolt11` tag and a `description` tag
//! whose value is the serialized inner zap request event. The payer is the
//! inner request's author, falling back to the receipt's author; the
//! amount comes from the inner request's `amount` tag in millisats,
//! falling back to the receipt's own `amount` tag.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use zapgate_core::GatewayError;
use zapgate_proto::Event;

/// A parsed, validated payment receipt ready to credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZapReceipt {
    pub payer_pubkey: String,
    pub amount_sats: u64,
    pub receipt_event_id: String,
    /// Id of the inner zap request event, when the description carried one.
    pub request_event_id: Option<String>,
    pub bolt11: String,
    /// The raw description tag value, kept for the local ledger record.
    pub description_raw: String,
}

impl ZapReceipt {
    /// Parses a receipt event. Fails with [`GatewayError::Parse`] on
    /// missing tags, an unparsable amount, or a zero amount.
    pub fn parse(event: &Event) -> Result<Self, GatewayError> {
        let bolt11 = event
            .tag_value("bolt11")
            .ok_or_else(|| GatewayError::Parse("receipt missing bolt11 tag".into()))?
            .to_string();
        let description_raw = event
            .tag_value("description")
            .ok_or_else(|| GatewayError::Parse("receipt missing description tag".into()))?
            .to_string();

        // The description is the serialized inner zap request. Parse it
        // leniently: a malformed inner request still allows falling back
        // to the outer event for payer and amount.
        let inner: Option<Value> = serde_json::from_str(&description_raw).ok();

        let payer_pubkey = inner
            .as_ref()
            .and_then(|v| v.get("pubkey"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(&event.pubkey)
            .to_string();

        let request_event_id = inner
            .as_ref()
            .and_then(|v| v.get("id"))
            .and_then(Value::as_str)
            .map(String::from);

        let millisats = inner
            .as_ref()
            .and_then(inner_amount_millisats)
            .or_else(|| {
                event
                    .tag_value("amount")
                    .and_then(|v| v.parse::<u64>().ok())
            })
            .ok_or_else(|| GatewayError::Parse("receipt has no parsable amount".into()))?;

        let amount_sats = millisats / 1000;
        if amount_sats == 0 {
            return Err(GatewayError::Parse(format!(
                "receipt amount {millisats} msat rounds down to zero sats"
            )));
        }

        Ok(Self {
            payer_pubkey,
            amount_sats,
            receipt_event_id: event.id.clone(),
            request_event_id,
            bolt11,
            description_raw,
        })
    }
}

/// Reads the `amount` tag (millisats) out of a parsed inner request.
fn inner_amount_millisats(inner: &Value) -> Option<u64> {
    inner
        .get("tags")?
        .as_array()?
        .iter()
        .filter_map(Value::as_array)
        .find(|tag| tag.first().and_then(Value::as_str) == Some("amount"))
        .and_then(|tag| tag.get(1))
        .and_then(Value::as_str)
        .and_then(|v| v.parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use zapgate_proto::{EventDraft, EventKind, Tag};

    fn receipt_event(tags: Vec<Tag>) -> Event {
        EventDraft::new("relay-service", 1_700_000_000, EventKind::ZapReceipt, tags, "")
            .into_event("00".repeat(64))
    }

    fn inner_request(pubkey: &str, amount_msat: Option<&str>) -> String {
        let mut tags: Vec<Vec<&str>> = vec![vec!["p", "gateway-pubkey"]];
        if let Some(amount) = amount_msat {
            tags.push(vec!["amount", amount]);
        }
        serde_json::json!({
            "id": "request-id-1",
            "pubkey": pubkey,
            "kind": 9734,
            "tags": tags,
            "content": "",
        })
        .to_string()
    }

    #[test]
    fn parses_inner_amount_and_payer() {
        let event = receipt_event(vec![
            Tag::bolt11("lnbc2500n1..."),
            Tag::description(inner_request("payer-1", Some("2500"))),
        ]);

        let receipt = ZapReceipt::parse(&event).unwrap();
        assert_eq!(receipt.payer_pubkey, "payer-1");
        assert_eq!(receipt.amount_sats, 2); // 2500 msat -> 2 sats, floor
        assert_eq!(receipt.receipt_event_id, event.id);
        assert_eq!(receipt.request_event_id.as_deref(), Some("request-id-1"));
    }

    #[test]
    fn falls_back_to_outer_author_and_amount_tag() {
        let event = receipt_event(vec![
            Tag::bolt11("lnbc..."),
            Tag::description("not json"),
            Tag::amount(5000),
        ]);

        let receipt = ZapReceipt::parse(&event).unwrap();
        assert_eq!(receipt.payer_pubkey, "relay-service");
        assert_eq!(receipt.amount_sats, 5);
    }

    #[test]
    fn inner_author_takes_precedence_over_outer() {
        let event = receipt_event(vec![
            Tag::bolt11("lnbc..."),
            Tag::description(inner_request("payer-inner", Some("3000"))),
            Tag::amount(9000),
        ]);

        let receipt = ZapReceipt::parse(&event).unwrap();
        assert_eq!(receipt.payer_pubkey, "payer-inner");
        // The inner amount wins too.
        assert_eq!(receipt.amount_sats, 3);
    }

    #[test]
    fn missing_tags_are_rejected() {
        let no_bolt11 = receipt_event(vec![Tag::description(inner_request("p", Some("1000")))]);
        assert!(ZapReceipt::parse(&no_bolt11).is_err());

        let no_description = receipt_event(vec![Tag::bolt11("lnbc...")]);
        assert!(ZapReceipt::parse(&no_description).is_err());
    }

    #[test]
    fn sub_sat_and_unparsable_amounts_are_rejected() {
        // 999 msat floors to zero sats.
        let tiny = receipt_event(vec![
            Tag::bolt11("lnbc..."),
            Tag::description(inner_request("p", Some("999"))),
        ]);
        assert!(ZapReceipt::parse(&tiny).is_err());

        let garbage = receipt_event(vec![
            Tag::bolt11("lnbc..."),
            Tag::description(inner_request("p", Some("lots"))),
        ]);
        assert!(ZapReceipt::parse(&garbage).is_err());
    }
}
