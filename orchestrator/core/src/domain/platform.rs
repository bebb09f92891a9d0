// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Virtualization Platform Port
//!
//! The hypervisor manager is an opaque capability. vrouter needs only a small
//! surface of it: connect, find a folder by name, list and inspect its
//! children, read the network inventory, and start long-running operations
//! (annotate, power, destroy, deploy) that must be waited on.
//!
//! A [`PlatformSession`] is scoped to one task invocation and must be
//! released on every exit path.
//!
//! Implementations live in `crate::infrastructure::platform`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::domain::image::Artifact;
use crate::domain::instance::{ChildEntity, InstanceState, PowerState, VmRef};
use crate::domain::network::{NetworkBinding, NetworkRef};

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("failed to connect to platform: {0}")]
    Connection(String),
    #[error("platform object not found: {0}")]
    NotFound(String),
    #[error("platform request failed: {0}")]
    Request(String),
    #[error("platform task {task} failed: {message}")]
    TaskFailed { task: String, message: String },
}

/// Handle to a long-running platform operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformTaskHandle(pub String);

impl PlatformTaskHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Terminal result of a long-running operation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskOutcome {
    /// Object produced by the operation (set for deployments).
    pub created: Option<VmRef>,
}

/// Opaque reference to a folder (ownership scope) on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FolderRef(pub String);

/// Request to deploy a new instance from an artifact.
#[derive(Debug, Clone)]
pub struct DeploySpec<'a> {
    pub artifact: &'a Artifact,
    pub bindings: &'a [NetworkBinding],
    pub folder: &'a FolderRef,
    pub name: &'a str,
}

#[async_trait]
pub trait VirtualizationPlatform: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn PlatformSession>, PlatformError>;
}

#[async_trait]
pub trait PlatformSession: Send + Sync {
    /// Locate the folder holding a tenant's instances.
    async fn locate_folder(&self, name: &str) -> Result<FolderRef, PlatformError>;

    async fn children(&self, folder: &FolderRef) -> Result<Vec<ChildEntity>, PlatformError>;

    async fn read_state(&self, vm: &VmRef) -> Result<InstanceState, PlatformError>;

    /// Network inventory, keyed by network name.
    async fn networks(&self) -> Result<HashMap<String, NetworkRef>, PlatformError>;

    async fn write_annotation(
        &self,
        vm: &VmRef,
        text: &str,
    ) -> Result<PlatformTaskHandle, PlatformError>;

    async fn set_power(
        &self,
        vm: &VmRef,
        state: PowerState,
    ) -> Result<PlatformTaskHandle, PlatformError>;

    async fn destroy(&self, vm: &VmRef) -> Result<PlatformTaskHandle, PlatformError>;

    async fn deploy_from_artifact(
        &self,
        spec: DeploySpec<'_>,
    ) -> Result<PlatformTaskHandle, PlatformError>;

    /// Block until the operation succeeds or fails. No timeout is imposed here.
    async fn wait_for_task(&self, handle: &PlatformTaskHandle) -> Result<TaskOutcome, PlatformError>;

    /// Release the session. Best-effort: failures are logged, not returned.
    async fn release(&self);
}
