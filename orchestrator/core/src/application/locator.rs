// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Instance Locator
//!
//! Finds a tenant's appliances by walking the children of their folder and
//! keeping only those tagged with the managed kind. A same-named VM of another
//! kind is indistinguishable from no VM at all.

use std::collections::BTreeMap;
use tracing::debug;

use crate::domain::errors::LifecycleError;
use crate::domain::instance::{InstanceState, OwnerScope, VmRef};
use crate::domain::platform::{FolderRef, PlatformError, PlatformSession};

/// A managed appliance located on the platform.
#[derive(Debug, Clone)]
pub struct LocatedInstance {
    pub vm: VmRef,
    pub state: InstanceState,
}

async fn owner_folder(
    session: &dyn PlatformSession,
    owner: &OwnerScope,
) -> Result<Option<FolderRef>, LifecycleError> {
    match session.locate_folder(owner.as_str()).await {
        Ok(folder) => Ok(Some(folder)),
        Err(PlatformError::NotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// All managed appliances owned by `owner`, keyed by instance name.
pub async fn find_instances(
    session: &dyn PlatformSession,
    owner: &OwnerScope,
) -> Result<BTreeMap<String, InstanceState>, LifecycleError> {
    let mut found = BTreeMap::new();

    let Some(folder) = owner_folder(session, owner).await? else {
        debug!("No folder for {}, nothing to show", owner);
        return Ok(found);
    };

    for child in session.children(&folder).await? {
        let state = session.read_state(&child.id).await?;
        if state.is_managed() {
            found.insert(child.name, state);
        }
    }

    Ok(found)
}

/// The managed appliance named `name` owned by `owner`.
pub async fn find_instance(
    session: &dyn PlatformSession,
    owner: &OwnerScope,
    name: &str,
) -> Result<LocatedInstance, LifecycleError> {
    let folder = owner_folder(session, owner)
        .await?
        .ok_or_else(|| LifecycleError::NotFound(name.to_string()))?;

    for child in session.children(&folder).await? {
        if child.name != name {
            continue;
        }
        let state = session.read_state(&child.id).await?;
        if state.is_managed() {
            return Ok(LocatedInstance {
                vm: child.id,
                state,
            });
        }
    }

    Err(LifecycleError::NotFound(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::platform::VirtualizationPlatform;
    use crate::infrastructure::platform::InMemoryPlatform;

    fn platform() -> InMemoryPlatform {
        let platform = InMemoryPlatform::new();
        platform.add_folder("alice");
        platform.add_instance("alice", "myRouter", "Router=1.1.8");
        platform.add_instance("alice", "gateway", "Jumpbox=2.0");
        platform.add_instance("alice", "scratch", "");
        platform.add_instance("bob", "bobRouter", "Router=1.0.32");
        platform
    }

    #[tokio::test]
    async fn test_find_instances_keeps_only_routers() {
        let platform = platform();
        let session = platform.connect().await.unwrap();

        let found = find_instances(&*session, &OwnerScope::new("alice")).await.unwrap();

        assert_eq!(found.keys().collect::<Vec<_>>(), vec!["myRouter"]);
        assert_eq!(found["myRouter"].annotation, "Router=1.1.8");
    }

    #[tokio::test]
    async fn test_find_instances_for_unknown_owner_is_empty() {
        let platform = platform();
        let session = platform.connect().await.unwrap();

        let found = find_instances(&*session, &OwnerScope::new("carol")).await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_find_instance_by_name() {
        let platform = platform();
        let session = platform.connect().await.unwrap();

        let located = find_instance(&*session, &OwnerScope::new("alice"), "myRouter")
            .await
            .unwrap();
        assert_eq!(located.state.name, "myRouter");
    }

    #[tokio::test]
    async fn test_find_instance_hides_other_kinds() {
        let platform = platform();
        let session = platform.connect().await.unwrap();

        let err = find_instance(&*session, &OwnerScope::new("alice"), "gateway")
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound(name) if name == "gateway"));
    }

    #[tokio::test]
    async fn test_find_instance_is_scoped_to_owner() {
        let platform = platform();
        let session = platform.connect().await.unwrap();

        let err = find_instance(&*session, &OwnerScope::new("alice"), "bobRouter")
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound(_)));
    }
}
