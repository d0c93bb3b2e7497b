// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Zapgate gateway.

use thiserror::Error;

/// The primary error type used across all Zapgate crates.
///
/// Everything recoverable is recovered at the lowest responsible owner;
/// only `Config` errors terminate the process.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration errors (missing required keys, invalid TOML, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, encoding).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Relay transport errors (connect failure, stream error, bad frame).
    #[error("relay error: {message}")]
    Relay {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// AI oracle errors (API failure, malformed response).
    #[error("oracle error: {message}")]
    Oracle {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Signing, key-parsing, or DM encryption/decryption failures.
    #[error("signer error: {0}")]
    Signer(String),

    /// Malformed wire data or records.
    #[error("parse error: {0}")]
    Parse(String),

    /// Event content was empty after decryption; dropped silently.
    #[error("empty content")]
    EmptyContent,

    /// Event or record already seen; dropped silently.
    #[error("duplicate")]
    Duplicate,

    /// Sender exceeded their token bucket.
    #[error("rate limited, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Work queue is at capacity (or stopped).
    #[error("work queue full")]
    QueueFull,

    /// Balance too low for the requested operation.
    #[error("insufficient funds: required {required} sats, balance {balance} sats")]
    InsufficientFunds { required: u64, balance: u64 },

    /// A concurrent debit won the race; no charge was applied.
    #[error("debit lost a concurrent update race")]
    DebitRace,

    /// No relay accepted the outbound event.
    #[error("publish failed on all relays")]
    PublishFailed,

    /// Operation exceeded its deadline.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// True for errors that should be dropped without user-visible output.
    pub fn is_silent_drop(&self) -> bool {
        matches!(self, GatewayError::Duplicate | GatewayError::EmptyContent)
    }
}
