// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signing and DM encryption for the Zapgate gateway.
//!
//! The [`Signer`] holds the gateway's secp256k1 keypair and performs the
//! three operations the pipeline needs: schnorr-signing event drafts,
//! encrypting DM payloads to a peer, and decrypting DM payloads from a
//! peer. The private key never leaves this crate.

pub mod keys;
pub mod nip04;
pub mod signer;

pub use keys::Keys;
pub use signer::Signer;

use thiserror::Error;

/// Errors from key handling, signing, and DM encryption.
#[derive(Debug, Error)]
pub enum SignerError {
    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("signing failed: {0}")]
    Signing(String),
}
