// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound event construction: sign, encrypt where needed, publish.

use std::sync::Arc;

use zapgate_core::{EventPublisher, GatewayError};
use zapgate_proto::{Event, EventDraft, EventKind, Tag};
use zapgate_signer::Signer;

/// Builds and publishes the gateway's outbound events.
pub struct Responder {
    signer: Arc<Signer>,
    publisher: Arc<dyn EventPublisher>,
}

impl Responder {
    pub fn new(signer: Arc<Signer>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self { signer, publisher }
    }

    pub fn public_key(&self) -> String {
        self.signer.public_key()
    }

    /// Encrypted DM to `to`, carrying the session tag when known.
    pub async fn dm(
        &self,
        to: &str,
        session_id: Option<&str>,
        text: &str,
    ) -> Result<Event, GatewayError> {
        let ciphertext = self
            .signer
            .encrypt(to, text)
            .map_err(|e| GatewayError::Signer(e.to_string()))?;

        let mut tags = vec![Tag::pubkey(to)];
        if let Some(session) = session_id {
            tags.push(Tag::session(session));
        }

        self.sign_and_publish(EventKind::EncryptedDm, tags, ciphertext)
            .await
    }

    /// Plaintext public reply threaded under `parent`.
    pub async fn public_reply(&self, parent: &Event, text: &str) -> Result<Event, GatewayError> {
        let tags = vec![
            Tag::event(parent.id.clone(), "reply"),
            Tag::pubkey(parent.pubkey.clone()),
        ];
        self.sign_and_publish(EventKind::Text, tags, text.to_string())
            .await
    }

    /// Plaintext public note mentioning `mention` (zap acknowledgements).
    pub async fn public_note(&self, text: &str, mention: &str) -> Result<Event, GatewayError> {
        let tags = vec![Tag::pubkey(mention)];
        self.sign_and_publish(EventKind::Text, tags, text.to_string())
            .await
    }

    /// Signed balance snapshot for `user`.
    pub async fn balance_snapshot(
        &self,
        user: &str,
        balance: u64,
    ) -> Result<Event, GatewayError> {
        let content = serde_json::json!({
            "balance": balance,
            "currency": "sats",
            "timestamp": chrono::Utc::now().timestamp_millis(),
        })
        .to_string();
        let tags = vec![Tag::pubkey(user), Tag::balance(balance)];
        self.sign_and_publish(EventKind::Balance, tags, content).await
    }

    async fn sign_and_publish(
        &self,
        kind: EventKind,
        tags: Vec<Tag>,
        content: String,
    ) -> Result<Event, GatewayError> {
        let draft = EventDraft::new(
            self.signer.public_key(),
            chrono::Utc::now().timestamp() as u64,
            kind,
            tags,
            content,
        );
        let event = self
            .signer
            .sign(draft)
            .map_err(|e| GatewayError::Signer(e.to_string()))?;
        self.publisher.publish(event.clone()).await?;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zapgate_test_utils::{signer, RecordingPublisher};

    fn responder() -> (Responder, Arc<RecordingPublisher>) {
        let publisher = Arc::new(RecordingPublisher::new());
        let responder = Responder::new(Arc::new(signer(1)), publisher.clone());
        (responder, publisher)
    }

    #[tokio::test]
    async fn dm_is_encrypted_and_tagged() {
        let (responder, publisher) = responder();
        let user = signer(2);

        let event = responder
            .dm(&user.public_key(), Some("s1"), "hello there")
            .await
            .unwrap();

        assert_eq!(event.kind, EventKind::EncryptedDm);
        assert_eq!(event.tag_value("p"), Some(user.public_key().as_str()));
        assert_eq!(event.tag_value("session"), Some("s1"));
        // Content is ciphertext, not the plaintext.
        assert_ne!(event.content, "hello there");
        assert!(event.content.contains("?iv="));

        // The recipient can decrypt it.
        let plaintext = user.decrypt(&responder.public_key(), &event.content).unwrap();
        assert_eq!(plaintext, "hello there");

        assert_eq!(publisher.published().len(), 1);
    }

    #[tokio::test]
    async fn public_reply_threads_under_parent() {
        let (responder, publisher) = responder();
        let author = signer(2);
        let parent = author
            .sign(EventDraft::new(
                author.public_key(),
                1_700_000_000,
                EventKind::Text,
                vec![],
                "question",
            ))
            .unwrap();

        let reply = responder.public_reply(&parent, "answer").await.unwrap();

        assert_eq!(reply.kind, EventKind::Text);
        assert_eq!(reply.content, "answer");
        let e_tag = reply.tags.iter().find(|t| t.name() == Some("e")).unwrap();
        assert_eq!(e_tag.0, vec!["e", &parent.id, "", "reply"]);
        assert_eq!(reply.tag_value("p"), Some(parent.pubkey.as_str()));
        assert_eq!(publisher.published().len(), 1);
    }

    #[tokio::test]
    async fn balance_snapshot_encodes_balance() {
        let (responder, _publisher) = responder();

        let event = responder.balance_snapshot("user-key", 80).await.unwrap();

        assert_eq!(event.kind, EventKind::Balance);
        assert_eq!(event.tag_value("balance"), Some("80"));
        assert_eq!(event.tag_value("p"), Some("user-key"));

        let content: serde_json::Value = serde_json::from_str(&event.content).unwrap();
        assert_eq!(content["balance"], 80);
        assert_eq!(content["currency"], "sats");
        assert!(content["timestamp"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn publish_failure_propagates() {
        let (responder, publisher) = responder();
        publisher.set_failing(true);

        let result = responder.public_note("thanks", "payer").await;
        assert!(matches!(result, Err(GatewayError::PublishFailed)));
    }
}
