// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! REST Platform Adapter
//!
//! Talks to a JSON gateway in front of the hypervisor manager.
//!
//! # Protocol
//!
//! | Call | Request | Response |
//! |------|---------|----------|
//! | open session | `POST /session` (basic auth) | `{"token"}` |
//! | locate folder | `GET /folders?name=<owner>` | `[{"id","name"}]` |
//! | children | `GET /folders/{id}/children` | `[{"id","name"}]` |
//! | read state | `GET /vms/{id}` | instance state |
//! | networks | `GET /networks` | `[{"id","name"}]` |
//! | annotate | `PATCH /vms/{id}` `{"annotation"}` | `{"task"}` |
//! | power | `POST /vms/{id}/power` `{"state"}` | `{"task"}` |
//! | destroy | `DELETE /vms/{id}` | `{"task"}` |
//! | deploy | `POST /deployments` | `{"task"}` |
//! | task state | `GET /tasks/{id}` | `{"state","result","error"}` |
//! | release | `DELETE /session` | - |
//!
//! Every call after `POST /session` carries the token in `X-Session-Token`.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::instance::{ChildEntity, InstanceState, PowerState, VmRef};
use crate::domain::network::NetworkRef;
use crate::domain::node_config::{resolve_secret, PlatformConfig};
use crate::domain::platform::{
    DeploySpec, FolderRef, PlatformError, PlatformSession, PlatformTaskHandle, TaskOutcome,
    VirtualizationPlatform,
};

const SESSION_HEADER: &str = "X-Session-Token";

pub struct RestPlatform {
    client: Client,
    endpoint: String,
    user: String,
    password: Option<String>,
    poll_interval: Duration,
}

impl RestPlatform {
    pub fn new(
        endpoint: impl Into<String>,
        user: impl Into<String>,
        password: Option<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            user: user.into(),
            password,
            poll_interval,
        }
    }

    pub fn from_config(config: &PlatformConfig) -> anyhow::Result<Self> {
        let password = config.password.as_deref().map(resolve_secret).transpose()?;
        let client = Client::builder()
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            user: config.user.clone(),
            password,
            poll_interval: Duration::from_millis(config.task_poll_interval_ms),
        })
    }
}

#[derive(Deserialize)]
struct SessionResponse {
    token: String,
}

#[derive(Deserialize)]
struct NamedObject {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct TaskAccepted {
    task: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum RemoteTaskState {
    Queued,
    Running,
    Success,
    Error,
}

#[derive(Deserialize)]
struct RemoteTask {
    state: RemoteTaskState,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct DeployBinding<'a> {
    slot: &'a str,
    network: &'a str,
}

#[derive(Serialize)]
struct DeployRequest<'a> {
    ova: String,
    folder: &'a str,
    name: &'a str,
    networks: Vec<DeployBinding<'a>>,
}

#[async_trait]
impl VirtualizationPlatform for RestPlatform {
    async fn connect(&self) -> Result<Box<dyn PlatformSession>, PlatformError> {
        let response = self
            .client
            .post(format!("{}/session", self.endpoint))
            .basic_auth(&self.user, self.password.as_deref())
            .send()
            .await
            .map_err(|e| PlatformError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PlatformError::Connection(format!(
                "session rejected with status {}",
                response.status()
            )));
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| PlatformError::Connection(e.to_string()))?;
        debug!("Opened platform session at {}", self.endpoint);

        Ok(Box::new(RestSession {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
            token: session.token,
            poll_interval: self.poll_interval,
        }))
    }
}

struct RestSession {
    client: Client,
    endpoint: String,
    token: String,
    poll_interval: Duration,
}

impl RestSession {
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.endpoint, path))
            .header(SESSION_HEADER, &self.token)
    }

    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<Response, PlatformError> {
        let response = builder
            .send()
            .await
            .map_err(|e| PlatformError::Request(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(PlatformError::NotFound(what.to_string())),
            status => Err(PlatformError::Request(format!("{what}: status {status}"))),
        }
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        what: &str,
    ) -> Result<T, PlatformError> {
        self.send(builder, what)
            .await?
            .json()
            .await
            .map_err(|e| PlatformError::Request(format!("{what}: {e}")))
    }

    async fn start_task<B: Serialize + ?Sized + Sync>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<PlatformTaskHandle, PlatformError> {
        let mut builder = self.request(method, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let accepted: TaskAccepted = self.fetch(builder, path).await?;
        Ok(PlatformTaskHandle::new(accepted.task))
    }
}

#[async_trait]
impl PlatformSession for RestSession {
    async fn locate_folder(&self, name: &str) -> Result<FolderRef, PlatformError> {
        let mut url = Url::parse(&format!("{}/folders", self.endpoint))
            .map_err(|e| PlatformError::Request(e.to_string()))?;
        url.query_pairs_mut().append_pair("name", name);

        let builder = self
            .client
            .get(url)
            .header(SESSION_HEADER, &self.token);
        let folders: Vec<NamedObject> = self.fetch(builder, "folders").await?;

        folders
            .into_iter()
            .find(|f| f.name == name)
            .map(|f| FolderRef(f.id))
            .ok_or_else(|| PlatformError::NotFound(format!("folder {name}")))
    }

    async fn children(&self, folder: &FolderRef) -> Result<Vec<ChildEntity>, PlatformError> {
        let path = format!("/folders/{}/children", folder.0);
        self.fetch(self.request(Method::GET, &path), &path).await
    }

    async fn read_state(&self, vm: &VmRef) -> Result<InstanceState, PlatformError> {
        let path = format!("/vms/{}", vm.0);
        self.fetch(self.request(Method::GET, &path), &path).await
    }

    async fn networks(&self) -> Result<HashMap<String, NetworkRef>, PlatformError> {
        let networks: Vec<NamedObject> =
            self.fetch(self.request(Method::GET, "/networks"), "networks").await?;
        Ok(networks
            .into_iter()
            .map(|n| (n.name, NetworkRef::new(n.id)))
            .collect())
    }

    async fn write_annotation(
        &self,
        vm: &VmRef,
        text: &str,
    ) -> Result<PlatformTaskHandle, PlatformError> {
        let body = serde_json::json!({ "annotation": text });
        self.start_task(Method::PATCH, &format!("/vms/{}", vm.0), Some(&body))
            .await
    }

    async fn set_power(
        &self,
        vm: &VmRef,
        state: PowerState,
    ) -> Result<PlatformTaskHandle, PlatformError> {
        let body = serde_json::json!({ "state": state });
        self.start_task(Method::POST, &format!("/vms/{}/power", vm.0), Some(&body))
            .await
    }

    async fn destroy(&self, vm: &VmRef) -> Result<PlatformTaskHandle, PlatformError> {
        self.start_task::<()>(Method::DELETE, &format!("/vms/{}", vm.0), None)
            .await
    }

    async fn deploy_from_artifact(
        &self,
        spec: DeploySpec<'_>,
    ) -> Result<PlatformTaskHandle, PlatformError> {
        let body = DeployRequest {
            ova: spec.artifact.path.display().to_string(),
            folder: &spec.folder.0,
            name: spec.name,
            networks: spec
                .bindings
                .iter()
                .map(|b| DeployBinding {
                    slot: &b.slot,
                    network: b.network.as_str(),
                })
                .collect(),
        };
        self.start_task(Method::POST, "/deployments", Some(&body))
            .await
    }

    async fn wait_for_task(&self, handle: &PlatformTaskHandle) -> Result<TaskOutcome, PlatformError> {
        let path = format!("/tasks/{}", handle.as_str());
        loop {
            let task: RemoteTask = self.fetch(self.request(Method::GET, &path), &path).await?;
            match task.state {
                RemoteTaskState::Success => {
                    return Ok(TaskOutcome {
                        created: task.result.map(VmRef::new),
                    })
                }
                RemoteTaskState::Error => {
                    return Err(PlatformError::TaskFailed {
                        task: handle.0.clone(),
                        message: task.error.unwrap_or_else(|| "unknown error".to_string()),
                    })
                }
                RemoteTaskState::Queued | RemoteTaskState::Running => {
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    async fn release(&self) {
        if let Err(e) = self.send(self.request(Method::DELETE, "/session"), "session").await {
            warn!("Failed to release platform session: {}", e);
        }
    }
}
