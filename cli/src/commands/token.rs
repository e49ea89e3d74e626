// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Token commands
//!
//! `token issue` signs an RS256 bearer token for a tenant with the host's
//! private key. Meant for operators and local testing.

use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::PathBuf;
use std::time::Duration;

use spinup_core::domain::node_config::NodeConfigManifest;
use spinup_core::domain::service::TenantId;
use spinup_core::infrastructure::jwt::JwtTokenIssuer;

#[derive(Subcommand)]
pub enum TokenCommand {
    /// Issue a bearer token for a tenant
    Issue {
        /// Tenant identifier placed in the token subject
        #[arg(short, long)]
        user: String,

        /// Token lifetime in seconds (default: spec.auth.token_ttl_secs)
        #[arg(long)]
        ttl: Option<u64>,

        /// Private key (default: spec.auth.private_key_path)
        #[arg(long, value_name = "FILE")]
        key: Option<PathBuf>,
    },
}

pub async fn handle_command(command: TokenCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        TokenCommand::Issue { user, ttl, key } => {
            let config = NodeConfigManifest::load_or_default(config_override)
                .context("Failed to load configuration")?;
            let key = key.unwrap_or_else(|| config.spec.private_key_path());
            let ttl = Duration::from_secs(ttl.unwrap_or(config.spec.auth.token_ttl_secs));

            let token = issue(&key, &user, ttl)?;
            println!("{}", token);
            Ok(())
        }
    }
}

fn issue(key: &std::path::Path, user: &str, ttl: Duration) -> Result<String> {
    let tenant = TenantId::new(user);
    tenant.validate().context("Invalid tenant identifier")?;

    let issuer = JwtTokenIssuer::from_file(key)
        .with_context(|| format!("Failed to load private key from {}", key.display()))?;
    issuer
        .issue(&tenant, ttl)
        .context("Failed to sign token")
}
