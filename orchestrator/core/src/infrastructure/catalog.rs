// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Filesystem Image Catalog
//!
//! Serves router images from a flat directory of OVA packages, typically an
//! NFS share mounted on every worker node. The directory listing is the
//! catalog; nothing is cached between calls.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::domain::image::{name_for_version, version_for_name, Artifact, CatalogError, ImageCatalog};
use crate::infrastructure::ova;

pub struct FilesystemImageCatalog {
    /// Directory holding `router-vyos-<version>.ova` files
    dir: PathBuf,
}

impl FilesystemImageCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

fn is_safe_version(version: &str) -> bool {
    !version.is_empty() && !version.contains(['/', '\\']) && !version.contains("..")
}

#[async_trait]
impl ImageCatalog for FilesystemImageCatalog {
    async fn list_versions(&self) -> Result<Vec<String>, CatalogError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(|e| {
            CatalogError::Unavailable(format!("{}: {}", self.dir.display(), e))
        })?;

        let mut versions = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    return Err(CatalogError::Unavailable(format!(
                        "{}: {}",
                        self.dir.display(),
                        e
                    )))
                }
            };

            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }

            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                warn!("Skipping non UTF-8 image name {:?}", file_name);
                continue;
            };

            match version_for_name(name) {
                Ok(version) => versions.push(version),
                Err(e) => warn!("Skipping {}", e),
            }
        }

        versions.sort();
        Ok(versions)
    }

    async fn open(&self, version: &str) -> Result<Artifact, CatalogError> {
        if !is_safe_version(version) {
            return Err(CatalogError::NoSuchImage(version.to_string()));
        }

        let path = self.dir.join(name_for_version(version));
        debug!("Opening {}", path.display());

        let network_slots = ova::network_slots(&path).await.map_err(|e| {
            debug!("Cannot open {}: {}", path.display(), e);
            CatalogError::NoSuchImage(version.to_string())
        })?;

        Ok(Artifact {
            version: version.to_string(),
            path,
            network_slots,
        })
    }
}
