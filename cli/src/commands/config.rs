// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use vrouter_core::domain::node_config::RouterNodeConfig;

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
        /// Output path (default: ./vrouter-config.yaml)
        #[arg(short, long, default_value = "./vrouter-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

/// `config` is the already loaded effective configuration; `config_override`
/// is only the `--config` path it came from, if any.
pub async fn handle_command(
    command: ConfigCommand,
    config: Result<RouterNodeConfig>,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config, config_override, paths, yaml).await,
        ConfigCommand::Validate { file: Some(file) } => {
            validate(RouterNodeConfig::load_or_default(Some(file))).await
        }
        ConfigCommand::Validate { file: None } => validate(config).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(
    config: Result<RouterNodeConfig>,
    config_override: Option<PathBuf>,
    show_paths: bool,
    as_yaml: bool,
) -> Result<()> {
    let config = config.context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. VROUTER_CONFIG_PATH: {}",
            std::env::var("VROUTER_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./vrouter-config.yaml");
        println!("  4. ~/.vrouter/config.yaml");
        println!("  5. /etc/vrouter/config.yaml");
        println!();
    }

    if as_yaml {
        let yaml = serde_yaml::to_string(&config).context("Failed to render configuration")?;
        print!("{}", yaml);
        return Ok(());
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Node:".bold());
    println!("  Name: {}", config.metadata.name);
    if let Some(version) = &config.metadata.version {
        println!("  Version: {}", version);
    }
    println!();

    println!("{}", "Platform:".bold());
    println!("  Backend: {:?}", spec.platform.backend);
    println!("  Endpoint: {}", spec.platform.endpoint);
    println!("  User: {}", spec.platform.user);
    println!(
        "  Password: {}",
        if spec.platform.password.is_some() { "(set)" } else { "(not set)" }
    );
    println!("  Verify TLS: {}", spec.platform.verify_tls);
    println!();

    println!("{}", "Images:".bold());
    println!("  Directory: {}", spec.images.dir.display());
    println!();

    println!("{}", "Workers:".bold());
    println!("  Count: {}", spec.workers.count);
    println!("  Queue capacity: {}", spec.workers.queue_capacity);
    println!("  Result TTL: {}s", spec.workers.result_ttl_secs);
    println!(
        "  Cleanup on failed provisioning: {}",
        spec.provisioning.cleanup_on_failure
    );
    println!();

    println!("{}", "API:".bold());
    println!("  Listen: {}:{}", spec.api.bind_address, spec.api.port);
    println!("  Base URL: {}", spec.api.base_url);
    println!(
        "  Token secret: {}",
        if spec.api.auth.secret.is_some() {
            "(set)".normal()
        } else {
            "(not set, tokens unverified)".yellow()
        }
    );
    println!();

    println!("{}", "Observability:".bold());
    println!(
        "  Logging: {} ({})",
        spec.observability.log_level, spec.observability.log_format
    );
    if spec.observability.metrics.enabled {
        println!("  Metrics: port {}", spec.observability.metrics.port);
    } else {
        println!("  Metrics: {}", "disabled".dimmed());
    }
    println!();

    Ok(())
}

async fn validate(config: Result<RouterNodeConfig>) -> Result<()> {
    println!("Validating configuration...");

    let config = config.context("Failed to load configuration")?;

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
