// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # spinup host CLI
//!
//! The `spinup` binary runs the provisioning HTTP server on a host and
//! carries the admin helpers around it.
//!
//! ## Commands
//!
//! - `spinup serve` - Run the HTTP API until Ctrl+C or SIGTERM
//! - `spinup config show|validate|generate` - Configuration management
//! - `spinup token issue --user <id>` - Sign a bearer token for a tenant

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use spinup_core::domain::node_config::NodeConfigManifest;
use spinup_orchestrator::commands::{self, ConfigCommand, ServeArgs, TokenCommand};
use spinup_orchestrator::logging::init_logging;

/// spinup - Self-hosted database provisioning
#[derive(Parser)]
#[command(name = "spinup")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "SPINUP_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to the configured level
    #[arg(long, global = true, env = "SPINUP_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the provisioning HTTP server
    #[command(name = "serve")]
    Serve {
        #[command(flatten)]
        args: ServeArgs,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Bearer token helpers
    #[command(name = "token")]
    Token {
        #[command(subcommand)]
        command: TokenCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // a missing .env is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { args }) => {
            let config = NodeConfigManifest::load_or_default(cli.config.clone())
                .context("Failed to load configuration")?;
            init_logging(&config.spec.logging, cli.log_level.as_deref())?;
            commands::serve::run(config, args).await
        }
        Some(Commands::Config { command }) => {
            init_logging(&Default::default(), Some(cli.log_level.as_deref().unwrap_or("warn")))?;
            commands::config::handle_command(command, cli.config).await
        }
        Some(Commands::Token { command }) => {
            init_logging(&Default::default(), Some(cli.log_level.as_deref().unwrap_or("warn")))?;
            commands::token::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}
