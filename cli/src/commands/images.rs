// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Local image catalog listing, no server required

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use vrouter_core::domain::image::{name_for_version, ImageCatalog};
use vrouter_core::domain::node_config::RouterNodeConfig;
use vrouter_core::infrastructure::FilesystemImageCatalog;

#[derive(Args)]
pub struct ImagesArgs {
    /// Image directory (default: spec.images.dir from configuration)
    #[arg(long, value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Also print each image's network slots
    #[arg(long)]
    slots: bool,
}

pub async fn handle_command(args: ImagesArgs, config: Result<RouterNodeConfig>) -> Result<()> {
    let dir = match args.dir {
        Some(dir) => dir,
        None => config.context("Failed to load configuration")?.spec.images.dir,
    };

    let catalog = FilesystemImageCatalog::new(&dir);
    let versions = catalog
        .list_versions()
        .await
        .with_context(|| format!("Failed to read image directory {}", dir.display()))?;

    if versions.is_empty() {
        println!("{}", format!("No images in {}", dir.display()).yellow());
        return Ok(());
    }

    println!("{} {}", "Images in".bold(), dir.display());
    for version in versions {
        if !args.slots {
            println!("  {}  {}", version.bold(), name_for_version(&version).dimmed());
            continue;
        }
        match catalog.open(&version).await {
            Ok(artifact) => println!(
                "  {}  slots: {}",
                version.bold(),
                artifact.network_slots.join(", ")
            ),
            Err(e) => println!("  {}  {}", version.bold(), e.to_string().red()),
        }
    }

    Ok(())
}
