// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Lifecycle Errors
//!
//! Every failure a workflow can report. All of them end up as the `error`
//! string of a task result; none of them is retried.

use thiserror::Error;

use crate::domain::image::CatalogError;
use crate::domain::network::MappingError;
use crate::domain::platform::PlatformError;

#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Named instance does not exist or is not a managed appliance.
    #[error("No router named {0} found")]
    NotFound(String),

    #[error("No such network {0}")]
    UnknownNetwork(String),

    #[error("No such image {0}")]
    NoSuchImage(String),

    #[error("Failed to provision router: {0}")]
    ProvisioningFailed(String),

    #[error("Failed to destroy router: {0}")]
    DecommissionFailed(String),

    #[error("Image catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("Malformed image name {0}")]
    MalformedImageName(String),

    #[error("Platform unavailable: {0}")]
    PlatformUnavailable(String),
}

impl From<CatalogError> for LifecycleError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Unavailable(msg) => LifecycleError::CatalogUnavailable(msg),
            CatalogError::MalformedName(name) => LifecycleError::MalformedImageName(name),
            CatalogError::NoSuchImage(version) => LifecycleError::NoSuchImage(version),
        }
    }
}

impl From<MappingError> for LifecycleError {
    fn from(err: MappingError) -> Self {
        match err {
            MappingError::UnknownNetwork(name) => LifecycleError::UnknownNetwork(name),
        }
    }
}

impl From<PlatformError> for LifecycleError {
    fn from(err: PlatformError) -> Self {
        LifecycleError::PlatformUnavailable(err.to_string())
    }
}
