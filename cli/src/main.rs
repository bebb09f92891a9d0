// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # vrouter
//!
//! The `vrouter` binary runs the router lifecycle service and talks to it.
//!
//! ## Commands
//!
//! - `vrouter serve` - HTTP API plus the task worker pool
//! - `vrouter router show|create|delete|images|status|health` - Client for a running server
//! - `vrouter images` - List a local image directory
//! - `vrouter config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use vrouter_cli::commands::{self, ConfigCommand, ImagesArgs, RouterCommand, ServeArgs, ServerArgs};
use vrouter_core::domain::node_config::RouterNodeConfig;

/// vrouter - per-tenant router appliances on demand
#[derive(Parser)]
#[command(name = "vrouter")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "VROUTER_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); default from configuration
    #[arg(long, global = true, env = "VROUTER_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (compact, json); default from configuration
    #[arg(long, global = true, env = "VROUTER_LOG_FORMAT")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API and task workers
    #[command(name = "serve")]
    Serve {
        #[command(flatten)]
        args: ServeArgs,
    },

    /// Router operations against a running server
    #[command(name = "router")]
    Router {
        #[command(flatten)]
        server: ServerArgs,

        #[command(subcommand)]
        command: RouterCommand,
    },

    /// List images in a local catalog directory
    #[command(name = "images")]
    Images {
        #[command(flatten)]
        args: ImagesArgs,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Read once, quietly, so the file can choose the log settings. A broken
    // file must not stop `config validate` from reporting it.
    let loaded = RouterNodeConfig::read(cli.config.clone());
    let observability = loaded
        .as_ref()
        .map(|(config, _)| config.spec.observability.clone())
        .unwrap_or_default();
    let level = cli.log_level.unwrap_or(observability.log_level);
    let format = cli.log_format.unwrap_or(observability.log_format);
    init_logging(&level, &format)?;

    let config = loaded.map(|(config, source)| config.finish_loading(&source));

    match cli.command {
        Some(Commands::Serve { args }) => commands::serve::run(args, config).await,
        Some(Commands::Router { server, command }) => {
            commands::router::handle_command(command, server).await
        }
        Some(Commands::Images { args }) => commands::images::handle_command(args, config).await,
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, config, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        builder.json().with_current_span(true).init();
    } else {
        builder
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .init();
    }

    Ok(())
}
