// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the Zapgate gateway.
//!
//! TOML files merged through an XDG hierarchy with `ZAPGATE_`-prefixed
//! environment variable overrides, followed by a semantic validation pass
//! that collects every problem instead of failing fast.

pub mod loader;
pub mod model;
pub mod validation;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::GatewayConfig;
pub use validation::{validate_config, ConfigError};

/// Error produced by the layered loader.
pub use figment::Error as LoadError;
