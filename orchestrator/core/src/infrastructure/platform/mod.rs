// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Virtualization platform adapters.
//!
//! - [`RestPlatform`] - JSON gateway in front of the hypervisor manager
//! - [`InMemoryPlatform`] - in-process simulator for development and tests

pub mod memory;
pub mod rest;

pub use memory::{InMemoryPlatform, Mutation};
pub use rest::RestPlatform;

use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::node_config::{PlatformBackend, PlatformConfig};
use crate::domain::platform::VirtualizationPlatform;

/// Build the platform adapter selected by configuration.
pub fn build_platform(config: &PlatformConfig) -> anyhow::Result<Arc<dyn VirtualizationPlatform>> {
    match config.backend {
        PlatformBackend::Rest => {
            info!("Using REST platform at {}", config.endpoint);
            let platform = RestPlatform::from_config(config)
                .context("Failed to initialize REST platform client")?;
            Ok(Arc::new(platform))
        }
        PlatformBackend::Memory => {
            warn!("Using in-memory platform simulator; no real instances will be managed");
            Ok(Arc::new(InMemoryPlatform::new()))
        }
    }
}
