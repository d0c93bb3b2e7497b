// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Merge order (later overrides earlier): compiled defaults,
//! `/etc/zapgate/zapgate.toml`, `~/.config/zapgate/zapgate.toml`,
//! `./zapgate.toml`, then `ZAPGATE_*` environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::GatewayConfig;

/// Load configuration from the standard XDG hierarchy with env overrides.
pub fn load_config() -> Result<GatewayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(GatewayConfig::default()))
        .merge(Toml::file("/etc/zapgate/zapgate.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("zapgate/zapgate.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("zapgate.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from an inline TOML string only (tests, tooling).
pub fn load_config_from_str(toml_content: &str) -> Result<GatewayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(GatewayConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from an explicit file path with env overrides.
pub fn load_config_from_path(path: &Path) -> Result<GatewayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(GatewayConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Environment provider with explicit section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` so keys that contain
/// underscores stay intact: `ZAPGATE_KEYS_PRIVATE_KEY` must map to
/// `keys.private_key`, not `keys.private.key`.
fn env_provider() -> Env {
    Env::prefixed("ZAPGATE_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("agent_", "agent.", 1)
            .replacen("keys_", "keys.", 1)
            .replacen("oracle_", "oracle.", 1)
            .replacen("relay_", "relay.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("engine_", "engine.", 1)
            .replacen("rate_limit_", "rate_limit.", 1)
            .replacen("costs_", "costs.", 1)
            .replacen("circuit_", "circuit.", 1)
            .replacen("web_", "web.", 1);
        mapped.into()
    })
}
