// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The gateway's signing handle.

use std::str::FromStr;

use secp256k1::schnorr;
use secp256k1::{All, Message, PublicKey, Secp256k1, XOnlyPublicKey};

use zapgate_proto::{Event, EventDraft};

use crate::keys::Keys;
use crate::{nip04, SignerError};

/// Holds the gateway keypair and performs signing plus DM encryption.
pub struct Signer {
    secp: Secp256k1<All>,
    keys: Keys,
}

impl Signer {
    pub fn new(keys: Keys) -> Self {
        Self {
            secp: Secp256k1::new(),
            keys,
        }
    }

    /// Parses a secret key (hex or `nsec`) and builds a signer from it.
    pub fn from_secret(input: &str) -> Result<Self, SignerError> {
        Ok(Self::new(Keys::parse(input)?))
    }

    /// The gateway's public identity: 64-char lowercase hex x-only key.
    pub fn public_key(&self) -> String {
        self.keys.public_key_hex()
    }

    /// Computes the draft's content hash and schnorr-signs it.
    pub fn sign(&self, draft: EventDraft) -> Result<Event, SignerError> {
        let id = draft.id();
        let digest = digest_from_hex(&id)?;
        let msg = Message::from_digest(digest);
        let sig = self.secp.sign_schnorr_no_aux_rand(&msg, &self.keys.keypair);
        Ok(draft.into_event(sig.to_string()))
    }

    /// Verifies an event's id and signature against its author key.
    pub fn verify(&self, event: &Event) -> Result<(), SignerError> {
        if !event.has_valid_id() {
            return Err(SignerError::Signing("event id does not match content".into()));
        }
        let digest = digest_from_hex(&event.id)?;
        let msg = Message::from_digest(digest);
        let sig = schnorr::Signature::from_str(&event.sig)
            .map_err(|e| SignerError::Signing(format!("malformed signature: {e}")))?;
        let author = XOnlyPublicKey::from_str(&event.pubkey)
            .map_err(|e| SignerError::InvalidPublicKey(e.to_string()))?;
        self.secp
            .verify_schnorr(&sig, &msg, &author)
            .map_err(|e| SignerError::Signing(format!("signature failed verification: {e}")))
    }

    /// Encrypts a DM payload for the peer identified by an x-only hex key.
    pub fn encrypt(&self, peer_pubkey_hex: &str, plaintext: &str) -> Result<String, SignerError> {
        let peer = full_pubkey(peer_pubkey_hex)?;
        nip04::encrypt(&self.keys.secret, &peer, plaintext)
    }

    /// Decrypts a DM payload from the peer identified by an x-only hex key.
    pub fn decrypt(&self, peer_pubkey_hex: &str, payload: &str) -> Result<String, SignerError> {
        let peer = full_pubkey(peer_pubkey_hex)?;
        nip04::decrypt(&self.keys.secret, &peer, payload)
    }
}

/// Lifts a 64-char x-only hex key to a full even-parity public key for ECDH.
fn full_pubkey(xonly_hex: &str) -> Result<PublicKey, SignerError> {
    PublicKey::from_str(&format!("02{xonly_hex}"))
        .map_err(|e| SignerError::InvalidPublicKey(format!("{xonly_hex}: {e}")))
}

fn digest_from_hex(id: &str) -> Result<[u8; 32], SignerError> {
    let bytes = hex::decode(id)
        .map_err(|e| SignerError::Signing(format!("event id is not hex: {e}")))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| SignerError::Signing(format!("event id must be 32 bytes, got {}", bytes.len())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use zapgate_proto::{EventKind, Tag};

    fn test_signer(seed: u8) -> Signer {
        Signer::new(Keys::from_bytes(&[seed; 32]).unwrap())
    }

    fn draft(signer: &Signer, content: &str) -> EventDraft {
        EventDraft::new(
            signer.public_key(),
            1_700_000_000,
            EventKind::Text,
            vec![Tag::pubkey("aa".repeat(32))],
            content,
        )
    }

    #[test]
    fn signed_event_verifies() {
        let signer = test_signer(1);
        let event = signer.sign(draft(&signer, "hello")).unwrap();

        assert_eq!(event.pubkey, signer.public_key());
        assert_eq!(event.sig.len(), 128);
        assert!(event.has_valid_id());
        signer.verify(&event).unwrap();
    }

    #[test]
    fn tampered_content_fails_verification() {
        let signer = test_signer(1);
        let mut event = signer.sign(draft(&signer, "hello")).unwrap();
        event.content = "tampered".into();
        assert!(signer.verify(&event).is_err());
    }

    #[test]
    fn signature_from_other_key_fails_verification() {
        let signer = test_signer(1);
        let other = test_signer(2);

        let mut event = signer.sign(draft(&signer, "hello")).unwrap();
        let forged = other.sign(draft(&signer, "hello")).unwrap();
        event.sig = forged.sig;
        assert!(signer.verify(&event).is_err());
    }

    #[test]
    fn dm_round_trip_between_gateway_and_user() {
        let gateway = test_signer(1);
        let user = test_signer(2);

        let payload = user.encrypt(&gateway.public_key(), "what is rust?").unwrap();
        let plaintext = gateway.decrypt(&user.public_key(), &payload).unwrap();
        assert_eq!(plaintext, "what is rust?");
    }

    #[test]
    fn encrypt_rejects_malformed_peer_key() {
        let signer = test_signer(1);
        assert!(signer.encrypt("zz", "hi").is_err());
        assert!(signer.decrypt("zz", "x?iv=y").is_err());
    }
}
