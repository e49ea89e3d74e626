// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use spinup_core::domain::node_config::NodeConfigManifest;

const MINIMAL_TEMPLATE: &str = include_str!("../../templates/config-minimal.yaml");
const EXAMPLES_TEMPLATE: &str = include_str!("../../templates/config-with-examples.yaml");

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the effective configuration as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./spinup-config.yaml)
        #[arg(short, long, default_value = "./spinup-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let config = NodeConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if as_yaml {
        print!("{}", serde_yaml::to_string(&config).context("Failed to serialize configuration")?);
        return Ok(());
    }

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. SPINUP_CONFIG_PATH: {}",
            std::env::var("SPINUP_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./spinup-config.yaml");
        println!("  4. ~/.spinup/config.yaml");
        println!("  5. /etc/spinup/config.yaml");
        println!();
    }

    let spec = &config.spec;

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Host:".bold());
    println!("  Name: {}", config.metadata.name);
    println!("  Project dir: {}", spec.project_dir.display());
    println!("  Architecture: {}", spec.architecture);
    println!(
        "  Listen: {}:{}",
        spec.network.bind_address, spec.network.port
    );
    println!();

    println!("{}", "Tokens:".bold());
    println!("  Public key: {}", spec.public_key_path().display());
    println!("  Private key: {}", spec.private_key_path().display());
    println!("  Issued lifetime: {}s", spec.auth.token_ttl_secs);
    println!();

    println!("{}", "Ports:".bold());
    println!("  Range: [{}, {})", spec.ports.start, spec.ports.end);
    println!("  Dial timeout: {}ms", spec.ports.dial_timeout_ms);
    println!("  Reservation TTL: {}s", spec.ports.reservation_ttl_secs);
    println!();

    println!("{}", "Container engine:".bold());
    println!("  docker: {}", spec.engine.docker_binary);
    println!("  compose: {}", spec.engine.compose_binary);
    println!("  Command timeout: {}s", spec.engine.command_timeout_secs);
    match &spec.compose.template_path {
        Some(path) => println!("  Template: {}", path.display()),
        None => println!("  Template: {}", "(built-in)".dimmed()),
    }
    println!();

    println!("{}", "DNS:".bold());
    if spec.dns.enabled {
        println!("  Enabled: {}", "yes".green());
        println!("  Domain: {}", spec.dns.domain);
        println!("  Record content: {}", spec.dns.record_content);
        println!(
            "  Zone: {}",
            spec.dns.zone_id.as_deref().unwrap_or("(not set)")
        );
        let token = if spec.dns.api_token.is_some() { "<redacted>" } else { "(not set)" };
        println!("  API token: {}", token);
    } else {
        println!("  Enabled: {}", "no".dimmed());
    }
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = NodeConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        EXAMPLES_TEMPLATE
    } else {
        MINIMAL_TEMPLATE
    };

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_templates_are_valid() {
        for template in [MINIMAL_TEMPLATE, EXAMPLES_TEMPLATE] {
            let config = NodeConfigManifest::from_yaml_str(template).unwrap();
            config.validate().unwrap();
        }
    }

    #[test]
    fn test_examples_template_enables_nothing_by_default() {
        let config = NodeConfigManifest::from_yaml_str(EXAMPLES_TEMPLATE).unwrap();
        assert!(!config.spec.dns.enabled);
        assert_eq!(config.spec.ports.start, 5432);
        assert_eq!(config.spec.ports.end, 5440);
    }

    #[tokio::test]
    async fn test_generate_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("spinup-config.yaml");

        generate(output.clone(), false).await.unwrap();

        let written = std::fs::read_to_string(&output).unwrap();
        assert_eq!(written, MINIMAL_TEMPLATE);
    }
}
