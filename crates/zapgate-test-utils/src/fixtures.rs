// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic keypairs and inbound event builders.

use zapgate_proto::{Event, EventDraft, EventKind, Tag};
use zapgate_signer::{Keys, Signer};

/// A signer from a deterministic 32-byte seed. Seeds 1..=255 are valid
/// secp256k1 secret keys.
pub fn signer(seed: u8) -> Signer {
    Signer::new(Keys::from_bytes(&[seed; 32]).expect("seed is a valid secret key"))
}

/// A signed, encrypted DM from `user` to `recipient_pubkey`.
pub fn dm_event(
    user: &Signer,
    recipient_pubkey: &str,
    text: &str,
    session: Option<&str>,
    created_at: u64,
) -> Event {
    let ciphertext = user
        .encrypt(recipient_pubkey, text)
        .expect("encryption with fixture keys succeeds");

    let mut tags = vec![Tag::pubkey(recipient_pubkey)];
    if let Some(session_id) = session {
        tags.push(Tag::session(session_id));
    }

    user.sign(EventDraft::new(
        user.public_key(),
        created_at,
        EventKind::EncryptedDm,
        tags,
        ciphertext,
    ))
    .expect("signing with fixture keys succeeds")
}

/// A signed public note mentioning `recipient_pubkey`.
pub fn mention_event(
    user: &Signer,
    recipient_pubkey: &str,
    text: &str,
    created_at: u64,
) -> Event {
    user.sign(EventDraft::new(
        user.public_key(),
        created_at,
        EventKind::Text,
        vec![Tag::pubkey(recipient_pubkey)],
        text,
    ))
    .expect("signing with fixture keys succeeds")
}

/// An unsigned-but-identified zap receipt crediting `payer_pubkey` with
/// `amount_msat` millisats via the inner request description.
pub fn receipt_event(payer_pubkey: &str, amount_msat: u64, created_at: u64) -> Event {
    let description = serde_json::json!({
        "id": format!("zap-request-{created_at}"),
        "pubkey": payer_pubkey,
        "kind": 9734,
        "tags": [["amount", amount_msat.to_string()]],
        "content": "",
    })
    .to_string();

    EventDraft::new(
        "zap-service-pubkey",
        created_at,
        EventKind::ZapReceipt,
        vec![Tag::bolt11("lnbc1fixture"), Tag::description(description)],
        "",
    )
    .into_event("00".repeat(64))
}
