// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Provisioning Workflow
//!
//! Deploys a router from a versioned image into the tenant's folder, wires
//! its declared network slots to the requested networks, then stamps the
//! `Router=<version>` tag and returns the freshly read state.
//!
//! Every platform step is awaited before the next one starts.

use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

use crate::application::context::ExecutionContext;
use crate::domain::annotation::InstanceTag;
use crate::domain::errors::LifecycleError;
use crate::domain::image::{name_for_version, ImageCatalog};
use crate::domain::instance::{InstanceState, PowerState, VmRef};
use crate::domain::network::map_networks;
use crate::domain::platform::{DeploySpec, PlatformError, PlatformSession};

pub struct ProvisioningWorkflow {
    catalog: Arc<dyn ImageCatalog>,
    cleanup_on_failure: bool,
}

impl ProvisioningWorkflow {
    pub fn new(catalog: Arc<dyn ImageCatalog>, cleanup_on_failure: bool) -> Self {
        Self {
            catalog,
            cleanup_on_failure,
        }
    }

    pub async fn create(
        &self,
        ctx: &ExecutionContext,
        name: &str,
        version: &str,
        requested_networks: &[Option<String>],
    ) -> Result<InstanceState, LifecycleError> {
        async {
            info!("Opening image {}", name_for_version(version));
            let artifact = self.catalog.open(version).await?;
            // A version the catalog accepts but a tag cannot carry is still unusable.
            let tag = InstanceTag::router(version)
                .map_err(|_| LifecycleError::NoSuchImage(version.to_string()))?;

            let session = ctx.connect().await?;
            let result = self
                .provision(&*session, ctx, name, &tag, &artifact, requested_networks)
                .await;
            session.release().await;
            result
        }
        .instrument(ctx.span.clone())
        .await
    }

    async fn provision(
        &self,
        session: &dyn PlatformSession,
        ctx: &ExecutionContext,
        name: &str,
        tag: &InstanceTag,
        artifact: &crate::domain::image::Artifact,
        requested_networks: &[Option<String>],
    ) -> Result<InstanceState, LifecycleError> {
        let folder = session
            .locate_folder(ctx.owner.as_str())
            .await
            .map_err(|e| match e {
                PlatformError::NotFound(_) => LifecycleError::ProvisioningFailed(format!(
                    "no folder for {}",
                    ctx.owner
                )),
                other => other.into(),
            })?;

        let known = session.networks().await?;
        let bindings = map_networks(&artifact.network_slots, requested_networks, &known)?;

        debug!("Deploying {} with {} network(s)", name, bindings.len());
        let handle = session
            .deploy_from_artifact(DeploySpec {
                artifact,
                bindings: &bindings,
                folder: &folder,
                name,
            })
            .await
            .map_err(provisioning_failed)?;
        let outcome = session
            .wait_for_task(&handle)
            .await
            .map_err(provisioning_failed)?;
        let vm = outcome.created.ok_or_else(|| {
            LifecycleError::ProvisioningFailed(format!("deployment of {name} produced no instance"))
        })?;

        if let Err(err) = annotate(session, &vm, tag).await {
            warn!("Annotating {} failed: {}", name, err);
            if self.cleanup_on_failure {
                discard(session, &vm).await;
            }
            return Err(err);
        }

        let state = session.read_state(&vm).await.map_err(provisioning_failed)?;
        if state.tag().as_ref() != Some(tag) {
            warn!("Annotation on {} reads back as '{}'", name, state.annotation);
            if self.cleanup_on_failure {
                discard(session, &vm).await;
            }
            return Err(LifecycleError::ProvisioningFailed(format!(
                "annotation on {} reads back as '{}'",
                name, state.annotation
            )));
        }

        Ok(state)
    }
}

async fn annotate(
    session: &dyn PlatformSession,
    vm: &VmRef,
    tag: &InstanceTag,
) -> Result<(), LifecycleError> {
    debug!("Writing annotation {}", tag);
    let handle = session
        .write_annotation(vm, &tag.to_string())
        .await
        .map_err(provisioning_failed)?;
    session
        .wait_for_task(&handle)
        .await
        .map_err(provisioning_failed)?;
    Ok(())
}

/// Best-effort removal of an instance that never got its tag.
async fn discard(session: &dyn PlatformSession, vm: &VmRef) {
    info!("Destroying untagged instance {}", vm.as_str());
    if let Ok(handle) = session.set_power(vm, PowerState::Off).await {
        let _ = session.wait_for_task(&handle).await;
    }
    match session.destroy(vm).await {
        Ok(handle) => {
            if let Err(e) = session.wait_for_task(&handle).await {
                warn!("Cleanup of {} failed: {}", vm.as_str(), e);
            }
        }
        Err(e) => warn!("Cleanup of {} failed: {}", vm.as_str(), e),
    }
}

fn provisioning_failed(err: PlatformError) -> LifecycleError {
    LifecycleError::ProvisioningFailed(err.to_string())
}
