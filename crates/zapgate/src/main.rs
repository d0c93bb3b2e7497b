// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Zapgate - a sat-metered gateway between Nostr relays and an AI backend.
//!
//! This is the binary entry point.

mod serve;
mod shutdown;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use zapgate_config::{load_config, load_config_from_path, validate_config, GatewayConfig};

/// Exit code for configuration problems.
const EXIT_CONFIG: u8 = 2;
/// Exit code for runtime failures (e.g. no relay reachable at startup).
const EXIT_RUNTIME: u8 = 1;

/// Zapgate - a sat-metered gateway between Nostr relays and an AI backend.
#[derive(Parser, Debug)]
#[command(name = "zapgate", version, about, long_about = None)]
struct Cli {
    /// Explicit config file path (defaults to the XDG hierarchy).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the gateway.
    Serve,
    /// Validate the effective configuration and exit.
    ConfigCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: failed to load configuration: {e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    match cli.command {
        Commands::Serve => {
            if let Err(errors) = validate_config(&config) {
                report_config_errors(&errors);
                return ExitCode::from(EXIT_CONFIG);
            }
            match serve::run_serve(config).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("error: {e}");
                    ExitCode::from(EXIT_RUNTIME)
                }
            }
        }
        Commands::ConfigCheck => match validate_config(&config) {
            Ok(()) => {
                println!("configuration OK");
                println!("  bot name:  {}", config.agent.name);
                println!("  relays:    {}", config.relays.len());
                println!("  database:  {}", config.storage.database_path);
                println!(
                    "  costs:     dm {} sats, public {} sats",
                    config.costs.dm_cost, config.costs.public_cost
                );
                ExitCode::SUCCESS
            }
            Err(errors) => {
                report_config_errors(&errors);
                ExitCode::from(EXIT_CONFIG)
            }
        },
    }
}

fn load(cli: &Cli) -> Result<GatewayConfig, zapgate_config::LoadError> {
    match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    }
}

fn report_config_errors(errors: &[zapgate_config::ConfigError]) {
    eprintln!("error: configuration is invalid:");
    for error in errors {
        eprintln!("  - {error}");
    }
}
