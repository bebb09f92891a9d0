// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Router Service
//!
//! The four lifecycle entry points (show, create, delete, list images) and
//! the task boundary that turns their outcomes into `{content, error, params}`.
//!
//! Create and delete hold the per-name lock for the whole workflow, so two
//! mutations of the same owner's router never overlap.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};

use crate::application::context::ExecutionContext;
use crate::application::decommission::DecommissionWorkflow;
use crate::application::dispatcher::TaskExecutor;
use crate::application::locator::find_instances;
use crate::application::name_locks::NameLocks;
use crate::application::provisioning::ProvisioningWorkflow;
use crate::domain::errors::LifecycleError;
use crate::domain::image::ImageCatalog;
use crate::domain::instance::{InstanceState, OwnerScope};
use crate::domain::platform::VirtualizationPlatform;
use crate::domain::task::{TaskRequest, TaskResult};

pub struct RouterService {
    platform: Arc<dyn VirtualizationPlatform>,
    catalog: Arc<dyn ImageCatalog>,
    provisioning: ProvisioningWorkflow,
    decommission: DecommissionWorkflow,
    locks: NameLocks,
}

impl RouterService {
    pub fn new(
        platform: Arc<dyn VirtualizationPlatform>,
        catalog: Arc<dyn ImageCatalog>,
        cleanup_on_failure: bool,
    ) -> Self {
        Self {
            platform,
            provisioning: ProvisioningWorkflow::new(catalog.clone(), cleanup_on_failure),
            catalog,
            decommission: DecommissionWorkflow::new(),
            locks: NameLocks::new(),
        }
    }

    fn context(&self, owner: &OwnerScope) -> ExecutionContext {
        ExecutionContext::new(self.platform.clone(), owner.clone())
    }

    pub async fn show(
        &self,
        owner: &OwnerScope,
    ) -> Result<BTreeMap<String, InstanceState>, LifecycleError> {
        let ctx = self.context(owner);
        let session = ctx.connect().await?;
        let result = find_instances(&*session, owner).await;
        session.release().await;
        result
    }

    /// Returns `{name: state}` for the new instance.
    pub async fn create(
        &self,
        owner: &OwnerScope,
        name: &str,
        version: &str,
        networks: &[Option<String>],
    ) -> Result<BTreeMap<String, InstanceState>, LifecycleError> {
        let _guard = self.locks.acquire(owner, name).await;
        let state = self
            .provisioning
            .create(&self.context(owner), name, version, networks)
            .await?;
        Ok(BTreeMap::from([(name.to_string(), state)]))
    }

    pub async fn delete(&self, owner: &OwnerScope, name: &str) -> Result<(), LifecycleError> {
        let _guard = self.locks.acquire(owner, name).await;
        self.decommission.delete(&self.context(owner), name).await
    }

    pub async fn list_images(&self) -> Result<Vec<String>, LifecycleError> {
        Ok(self.catalog.list_versions().await?)
    }

    /// Run one request to its terminal result. Never fails: lifecycle errors
    /// become the result's `error` string.
    pub async fn execute(&self, request: TaskRequest) -> TaskResult {
        let kind = request.kind();
        info!("Task starting");

        let outcome = match request {
            TaskRequest::Show { owner } => self.show(&owner).await.map(to_content),
            TaskRequest::Create {
                owner,
                name,
                image,
                networks,
            } => self
                .create(&owner, &name, &image, &networks)
                .await
                .map(to_content),
            TaskRequest::Delete { owner, name } => self
                .delete(&owner, &name)
                .await
                .map(|()| Value::Object(Map::new())),
            TaskRequest::Image { .. } => self
                .list_images()
                .await
                .map(|versions| json!({ "image": versions })),
        };

        match outcome {
            Ok(content) => {
                info!("Task complete");
                TaskResult::ok(content)
            }
            Err(e) => {
                error!("Task failed: {} ({})", e, kind.as_str());
                TaskResult::failed(e.to_string())
            }
        }
    }
}

#[async_trait]
impl TaskExecutor for RouterService {
    async fn execute(&self, request: TaskRequest) -> TaskResult {
        RouterService::execute(self, request).await
    }
}

fn to_content(instances: BTreeMap<String, InstanceState>) -> Value {
    serde_json::to_value(instances).unwrap_or_else(|_| Value::Object(Map::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::image::{Artifact, CatalogError};
    use crate::infrastructure::platform::InMemoryPlatform;
    use std::path::PathBuf;

    struct FixedCatalog;

    #[async_trait]
    impl ImageCatalog for FixedCatalog {
        async fn list_versions(&self) -> Result<Vec<String>, CatalogError> {
            Ok(vec!["1.0.32".into(), "1.1.8".into()])
        }

        async fn open(&self, version: &str) -> Result<Artifact, CatalogError> {
            Ok(Artifact {
                version: version.to_string(),
                path: PathBuf::from(format!("/images/router-vyos-{version}.ova")),
                network_slots: vec!["WAN".into(), "LAN".into()],
            })
        }
    }

    fn service() -> (Arc<InMemoryPlatform>, RouterService) {
        let platform = Arc::new(InMemoryPlatform::new());
        platform.add_folder("alice");
        platform.add_network("net1", "network-1");
        platform.add_network("net2", "network-2");
        let service = RouterService::new(platform.clone(), Arc::new(FixedCatalog), true);
        (platform, service)
    }

    #[tokio::test]
    async fn test_execute_image() {
        let (_, service) = service();
        let result = service
            .execute(TaskRequest::Image {
                owner: OwnerScope::new("alice"),
            })
            .await;
        assert_eq!(result.content, json!({"image": ["1.0.32", "1.1.8"]}));
        assert!(!result.is_error());
    }

    #[tokio::test]
    async fn test_execute_create_then_show() {
        let (_, service) = service();
        let owner = OwnerScope::new("alice");

        let created = service
            .execute(TaskRequest::Create {
                owner: owner.clone(),
                name: "myRouter".into(),
                image: "1.0.32".into(),
                networks: vec![Some("net1".into()), Some("net2".into()), None],
            })
            .await;
        assert_eq!(created.error, None);
        assert_eq!(created.content["myRouter"]["annotation"], "Router=1.0.32");

        let shown = service.execute(TaskRequest::Show { owner }).await;
        let names: Vec<_> = shown.content.as_object().unwrap().keys().cloned().collect();
        assert_eq!(names, vec!["myRouter"]);
    }

    #[tokio::test]
    async fn test_execute_delete_reports_not_found() {
        let (platform, service) = service();
        let result = service
            .execute(TaskRequest::Delete {
                owner: OwnerScope::new("alice"),
                name: "doesNotExist".into(),
            })
            .await;

        assert_eq!(result.error.as_deref(), Some("No router named doesNotExist found"));
        assert_eq!(result.content, json!({}));
        assert!(platform.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_execute_delete_success_has_empty_content() {
        let (_, service) = service();
        let platform_owner = OwnerScope::new("alice");
        service
            .create(&platform_owner, "myRouter", "1.0.32", &[Some("net1".into()), Some("net2".into())])
            .await
            .unwrap();

        let result = service
            .execute(TaskRequest::Delete {
                owner: platform_owner,
                name: "myRouter".into(),
            })
            .await;
        assert_eq!(result, TaskResult::ok(json!({})));
    }

    #[tokio::test]
    async fn test_platform_outage_becomes_error_string() {
        let (platform, service) = service();
        platform.fail_connect(true);

        let result = service
            .execute(TaskRequest::Show {
                owner: OwnerScope::new("alice"),
            })
            .await;
        assert!(result.error.unwrap().starts_with("Platform unavailable"));
    }
}
