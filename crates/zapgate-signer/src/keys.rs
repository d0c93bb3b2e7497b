// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Secret key parsing and keypair derivation.
//!
//! Secret keys are accepted as 64-char lowercase hex or in a bech32
//! `nsec1...` envelope.

use bech32::{Bech32, Hrp};
use secp256k1::{Keypair, Secp256k1, SecretKey, XOnlyPublicKey};

use crate::SignerError;

/// A parsed secp256k1 keypair with its x-only public half.
pub struct Keys {
    pub(crate) secret: SecretKey,
    pub(crate) keypair: Keypair,
    xonly: XOnlyPublicKey,
}

impl Keys {
    /// Parses a secret key from hex or a bech32 `nsec` envelope.
    pub fn parse(input: &str) -> Result<Self, SignerError> {
        let trimmed = input.trim();
        let bytes = if trimmed.starts_with("nsec1") {
            decode_nsec(trimmed)?
        } else {
            hex::decode(trimmed)
                .map_err(|e| SignerError::InvalidSecretKey(format!("not valid hex: {e}")))?
        };
        Self::from_bytes(&bytes)
    }

    /// Builds a keypair from raw 32-byte secret key material.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignerError> {
        let secret = SecretKey::from_slice(bytes)
            .map_err(|e| SignerError::InvalidSecretKey(e.to_string()))?;
        let secp = Secp256k1::new();
        let keypair = Keypair::from_secret_key(&secp, &secret);
        let (xonly, _parity) = XOnlyPublicKey::from_keypair(&keypair);
        Ok(Self {
            secret,
            keypair,
            xonly,
        })
    }

    /// Generates a fresh random keypair.
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret, _public) = secp.generate_keypair(&mut rand::thread_rng());
        let keypair = Keypair::from_secret_key(&secp, &secret);
        let (xonly, _parity) = XOnlyPublicKey::from_keypair(&keypair);
        Self {
            secret,
            keypair,
            xonly,
        }
    }

    /// The 64-char lowercase hex x-only public key.
    pub fn public_key_hex(&self) -> String {
        self.xonly.to_string()
    }

    /// The x-only public key.
    pub fn public_key(&self) -> XOnlyPublicKey {
        self.xonly
    }

    /// The public identity in a bech32 `npub` envelope.
    pub fn npub(&self) -> Result<String, SignerError> {
        let hrp = Hrp::parse("npub")
            .map_err(|e| SignerError::InvalidPublicKey(format!("npub hrp: {e}")))?;
        bech32::encode::<Bech32>(hrp, &self.xonly.serialize())
            .map_err(|e| SignerError::InvalidPublicKey(format!("npub encode: {e}")))
    }
}

fn decode_nsec(input: &str) -> Result<Vec<u8>, SignerError> {
    let (hrp, data) = bech32::decode(input)
        .map_err(|e| SignerError::InvalidSecretKey(format!("bech32: {e}")))?;
    if hrp.as_str() != "nsec" {
        return Err(SignerError::InvalidSecretKey(format!(
            "expected nsec envelope, got {}",
            hrp.as_str()
        )));
    }
    Ok(data)
}
