// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints serde cannot express: required secrets,
//! relay URL schemes, positive thresholds. Collects every error rather
//! than failing fast so the operator can fix a config in one pass.

use thiserror::Error;

use crate::model::GatewayConfig;

/// A single configuration problem.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required config: {key}")]
    Missing { key: String },

    #[error("invalid config: {message}")]
    Validation { message: String },
}

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    match &config.keys.private_key {
        None => errors.push(ConfigError::Missing {
            key: "keys.private_key".into(),
        }),
        Some(key) if key.trim().is_empty() => errors.push(ConfigError::Missing {
            key: "keys.private_key".into(),
        }),
        Some(_) => {}
    }

    match &config.oracle.api_key {
        None => errors.push(ConfigError::Missing {
            key: "oracle.api_key".into(),
        }),
        Some(key) if key.trim().is_empty() => errors.push(ConfigError::Missing {
            key: "oracle.api_key".into(),
        }),
        Some(_) => {}
    }

    if config.relays.is_empty() {
        errors.push(ConfigError::Missing {
            key: "relays".into(),
        });
    }
    for url in &config.relays {
        if !url.starts_with("ws://") && !url.starts_with("wss://") {
            errors.push(ConfigError::Validation {
                message: format!("relay url `{url}` must use ws:// or wss://"),
            });
        }
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".into(),
        });
    }

    if config.engine.max_concurrent == 0 {
        errors.push(ConfigError::Validation {
            message: "engine.max_concurrent must be at least 1".into(),
        });
    }
    if config.engine.max_queue_size == 0 {
        errors.push(ConfigError::Validation {
            message: "engine.max_queue_size must be at least 1".into(),
        });
    }

    if config.rate_limit.max_tokens == 0 {
        errors.push(ConfigError::Validation {
            message: "rate_limit.max_tokens must be at least 1".into(),
        });
    }
    if config.rate_limit.refill_rate < 0.0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "rate_limit.refill_rate must be non-negative, got {}",
                config.rate_limit.refill_rate
            ),
        });
    }

    if config.circuit.failure_threshold == 0 {
        errors.push(ConfigError::Validation {
            message: "circuit.failure_threshold must be at least 1".into(),
        });
    }
    if config.circuit.success_threshold == 0 {
        errors.push(ConfigError::Validation {
            message: "circuit.success_threshold must be at least 1".into(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_valid() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.keys.private_key = Some("ab".repeat(32));
        config.oracle.api_key = Some("sk-test".into());
        config.relays = vec!["wss://relay.example.com".into()];
        config
    }

    #[test]
    fn minimal_config_validates() {
        assert!(validate_config(&minimal_valid()).is_ok());
    }

    #[test]
    fn default_config_reports_all_missing_keys() {
        let errors = validate_config(&GatewayConfig::default()).unwrap_err();
        let keys: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        assert!(keys.iter().any(|k| k.contains("keys.private_key")), "{keys:?}");
        assert!(keys.iter().any(|k| k.contains("oracle.api_key")), "{keys:?}");
        assert!(keys.iter().any(|k| k.contains("relays")), "{keys:?}");
    }

    #[test]
    fn bad_relay_scheme_fails() {
        let mut config = minimal_valid();
        config.relays.push("https://not-a-relay.example".into());
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.to_string().contains("ws:// or wss://")));
    }

    #[test]
    fn zero_thresholds_fail() {
        let mut config = minimal_valid();
        config.engine.max_concurrent = 0;
        config.rate_limit.max_tokens = 0;
        config.circuit.failure_threshold = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3, "{errors:?}");
    }

    #[test]
    fn blank_secret_counts_as_missing() {
        let mut config = minimal_valid();
        config.keys.private_key = Some("   ".into());
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Missing { key } if key == "keys.private_key")));
    }
}
