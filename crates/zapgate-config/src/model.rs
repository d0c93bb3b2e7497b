// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Zapgate gateway.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so typos in config keys
//! are rejected at startup with an actionable message.

use serde::{Deserialize, Serialize};

/// Top-level Zapgate configuration.
///
/// All sections default to sensible values; the validation pass enforces
/// the keys that have no usable default (private key, API key, relays).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Bot identity and logging.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Signing key material.
    #[serde(default)]
    pub keys: KeysConfig,

    /// AI backend settings.
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Relay URLs to subscribe and publish to.
    #[serde(default)]
    pub relays: Vec<String>,

    /// Relay supervision tuning (reconnect policy).
    #[serde(default)]
    pub relay: RelayConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Work queue and processing settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Per-user rate limiting.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Per-message charging in sats.
    #[serde(default)]
    pub costs: CostsConfig,

    /// Circuit breaker around the oracle.
    #[serde(default)]
    pub circuit: CircuitConfig,

    /// Dashboard surface (served elsewhere; only the port is configured here).
    #[serde(default)]
    pub web: WebConfig,
}

/// Bot identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the bot.
    #[serde(default = "default_bot_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_bot_name() -> String {
    "ZapAI".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Signing key configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KeysConfig {
    /// Gateway secret key, 64-char hex or bech32 `nsec1...`. Required.
    #[serde(default)]
    pub private_key: Option<String>,
}

/// AI backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OracleConfig {
    /// API key for the AI backend. Required.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model identifier sent with every request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Hard per-call timeout in milliseconds.
    #[serde(default = "default_oracle_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            timeout_ms: default_oracle_timeout_ms(),
        }
    }
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_oracle_timeout_ms() -> u64 {
    55_000
}

/// Relay supervision configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Per-connection websocket connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Base reconnect backoff in milliseconds (doubled per attempt).
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Reconnect backoff ceiling in milliseconds.
    #[serde(default = "default_backoff_ceiling_ms")]
    pub backoff_ceiling_ms: u64,

    /// Consecutive failed cycles before a relay is marked permanently failed.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// How long startup waits for the first relay connection, in milliseconds.
    #[serde(default = "default_startup_window_ms")]
    pub startup_window_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_ceiling_ms: default_backoff_ceiling_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            startup_window_ms: default_startup_window_ms(),
        }
    }
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_backoff_base_ms() -> u64 {
    5_000
}

fn default_backoff_ceiling_ms() -> u64 {
    60_000
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_startup_window_ms() -> u64 {
    30_000
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "zapgate.db".to_string()
}

/// Work queue and processing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Maximum concurrently processing jobs.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Maximum queued jobs before enqueues fail.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// Per-job timeout in milliseconds.
    #[serde(default = "default_queue_timeout_ms")]
    pub queue_timeout_ms: u64,

    /// Attempts per job before it counts as a permanent failure.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Base retry delay in milliseconds (multiplied by the attempt number).
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Pause before publishing a response, in milliseconds.
    #[serde(default = "default_response_delay_ms")]
    pub response_delay_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            max_queue_size: default_max_queue_size(),
            queue_timeout_ms: default_queue_timeout_ms(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            response_delay_ms: default_response_delay_ms(),
        }
    }
}

fn default_max_concurrent() -> usize {
    10
}

fn default_max_queue_size() -> usize {
    10_000
}

fn default_queue_timeout_ms() -> u64 {
    60_000
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

fn default_response_delay_ms() -> u64 {
    2_000
}

/// Per-user token bucket configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Bucket capacity.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Tokens restored per second.
    #[serde(default = "default_refill_rate")]
    pub refill_rate: f64,

    /// Idle window after which unused buckets are swept, in milliseconds.
    #[serde(default = "default_rate_window_ms")]
    pub window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            refill_rate: default_refill_rate(),
            window_ms: default_rate_window_ms(),
        }
    }
}

fn default_max_tokens() -> u32 {
    50
}

fn default_refill_rate() -> f64 {
    5.0
}

fn default_rate_window_ms() -> u64 {
    60_000
}

/// Per-message charging configuration, in sats.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CostsConfig {
    #[serde(default = "default_dm_cost")]
    pub dm_cost: u64,

    #[serde(default = "default_public_cost")]
    pub public_cost: u64,
}

impl Default for CostsConfig {
    fn default() -> Self {
        Self {
            dm_cost: default_dm_cost(),
            public_cost: default_public_cost(),
        }
    }
}

fn default_dm_cost() -> u64 {
    20
}

fn default_public_cost() -> u64 {
    50
}

/// Circuit breaker configuration for the oracle.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CircuitConfig {
    /// Consecutive failures before the circuit opens.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Consecutive half-open successes before the circuit closes.
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,

    /// Hard per-call timeout in milliseconds.
    #[serde(default = "default_circuit_timeout_ms")]
    pub timeout_ms: u64,

    /// Open-state duration before a half-open probe, in milliseconds.
    #[serde(default = "default_reset_timeout_ms")]
    pub reset_timeout_ms: u64,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            timeout_ms: default_circuit_timeout_ms(),
            reset_timeout_ms: default_reset_timeout_ms(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_success_threshold() -> u32 {
    1
}

fn default_circuit_timeout_ms() -> u64 {
    55_000
}

fn default_reset_timeout_ms() -> u64 {
    30_000
}

/// Dashboard configuration. The HTTP surface itself lives outside the core.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WebConfig {
    #[serde(default = "default_web_port")]
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            port: default_web_port(),
        }
    }
}

fn default_web_port() -> u16 {
    8080
}
