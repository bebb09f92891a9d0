// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Image Catalog
//!
//! Router images are OVA packages on a shared filesystem, named
//! `router-<family>-<version>.ova` (e.g. `router-vyos-1.1.8.ova`). The version
//! string is the only handle callers ever see; the artifact name is derived
//! from it and back.
//!
//! | Item | Role |
//! |------|------|
//! | [`name_for_version`] / [`version_for_name`] | exact inverse conversions |
//! | [`ImageCatalog`] | port implemented by `infrastructure::catalog` |
//! | [`Artifact`] | an opened image with its declared network slots |

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub const IMAGE_PREFIX: &str = "router";
pub const IMAGE_FAMILY: &str = "vyos";
pub const IMAGE_EXTENSION: &str = ".ova";

const DELIMITER: char = '-';
const SEGMENTS: usize = 3;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("image catalog unavailable: {0}")]
    Unavailable(String),
    #[error("malformed image name '{0}'")]
    MalformedName(String),
    #[error("no such image {0}")]
    NoSuchImage(String),
}

/// Artifact file name for `version`. Input is not validated.
pub fn name_for_version(version: &str) -> String {
    format!("{IMAGE_PREFIX}{DELIMITER}{IMAGE_FAMILY}{DELIMITER}{version}{IMAGE_EXTENSION}")
}

/// Version embedded in an artifact file name.
///
/// The name is split into at most three `-` segments, so versions that
/// themselves contain `-` survive the round trip.
pub fn version_for_name(name: &str) -> Result<String, CatalogError> {
    let segments: Vec<&str> = name.splitn(SEGMENTS, DELIMITER).collect();
    if segments.len() != SEGMENTS || segments.iter().any(|s| s.is_empty()) {
        return Err(CatalogError::MalformedName(name.to_string()));
    }

    let version = segments[2]
        .strip_suffix(IMAGE_EXTENSION)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CatalogError::MalformedName(name.to_string()))?;

    Ok(version.to_string())
}

/// An image opened for deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub version: String,
    pub path: PathBuf,
    /// Network slots declared by the package, in declaration order.
    pub network_slots: Vec<String>,
}

#[async_trait]
pub trait ImageCatalog: Send + Sync {
    /// All versions available for deployment, stable for a given snapshot.
    async fn list_versions(&self) -> Result<Vec<String>, CatalogError>;

    /// Open the artifact for `version`, reading its declared network slots.
    async fn open(&self, version: &str) -> Result<Artifact, CatalogError>;
}
