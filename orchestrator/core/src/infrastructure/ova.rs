// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! OVA package reader.
//!
//! An OVA is a plain tar archive whose first member is an OVF descriptor
//! (XML). The only thing deployment needs up front is the list of network
//! slots the descriptor declares in its `NetworkSection`.

use regex::Regex;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::task::spawn_blocking;
use tracing::debug;

const DESCRIPTOR_EXTENSION: &str = ".ovf";
const NETWORK_PATTERN: &str = r#"<(?:ovf:)?Network\s[^>]*?\bovf:name\s*=\s*"([^"]*)""#;

#[derive(Debug, Error)]
pub enum OvaError {
    #[error("failed to read package: {0}")]
    Io(#[from] std::io::Error),
    #[error("no OVF descriptor in {0}")]
    MissingDescriptor(PathBuf),
    #[error("invalid network pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Network slots declared by the package at `path`, in declaration order.
pub async fn network_slots(path: &Path) -> Result<Vec<String>, OvaError> {
    let path = path.to_owned();
    spawn_blocking(move || read_network_slots(&path))
        .await
        .map_err(|e| OvaError::Io(std::io::Error::other(e)))?
}

pub fn read_network_slots(path: &Path) -> Result<Vec<String>, OvaError> {
    let descriptor = read_descriptor(path)?;
    let slots = parse_ovf_networks(&descriptor)?;
    debug!(path = %path.display(), slots = slots.len(), "read OVF network section");
    Ok(slots)
}

fn read_descriptor(path: &Path) -> Result<String, OvaError> {
    let mut archive = tar::Archive::new(File::open(path)?);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let is_descriptor = entry
            .path()?
            .to_str()
            .is_some_and(|name| name.ends_with(DESCRIPTOR_EXTENSION));
        if is_descriptor {
            let mut descriptor = String::new();
            entry.read_to_string(&mut descriptor)?;
            return Ok(descriptor);
        }
    }

    Err(OvaError::MissingDescriptor(path.to_owned()))
}

/// Names of the `<Network>` entries of an OVF descriptor's `NetworkSection`.
pub fn parse_ovf_networks(descriptor: &str) -> Result<Vec<String>, OvaError> {
    let section = match (
        descriptor.find("NetworkSection"),
        descriptor.rfind("NetworkSection"),
    ) {
        (Some(start), Some(end)) if end > start => &descriptor[start..end],
        _ => descriptor,
    };

    let pattern = Regex::new(NETWORK_PATTERN)?;
    Ok(pattern
        .captures_iter(section)
        .map(|c| c[1].to_string())
        .collect())
}
