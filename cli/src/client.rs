// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP client for a running vrouter server

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use vrouter_core::presentation::api::ROUTE_BASE;
use vrouter_core::presentation::auth::AUTH_HEADER;

/// Body returned by every dispatch endpoint.
#[derive(Debug, Deserialize)]
struct Accepted {
    content: AcceptedContent,
}

#[derive(Debug, Deserialize)]
struct AcceptedContent {
    #[serde(rename = "task-id")]
    task_id: String,
}

/// A dispatched task as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTicket {
    pub task_id: String,
    /// Value of the `Link` header, if the server sent one
    pub status_link: Option<String>,
}

/// Outcome of a single status poll.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskPoll {
    Pending,
    Finished(Value),
}

#[derive(Debug, Clone)]
pub struct RouterClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl RouterClient {
    pub fn new(server: &str, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: server.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}{}{}", self.base_url, ROUTE_BASE, suffix)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(AUTH_HEADER, token),
            None => request,
        }
    }

    pub async fn show(&self) -> Result<TaskTicket> {
        let request = self.authorized(self.client.get(self.url("")));
        self.dispatch(request, "show routers").await
    }

    pub async fn create(
        &self,
        name: &str,
        image: &str,
        networks: &[Option<String>],
    ) -> Result<TaskTicket> {
        let request = self.authorized(self.client.post(self.url(""))).json(&json!({
            "name": name,
            "image": image,
            "networks": networks,
        }));
        self.dispatch(request, "create router").await
    }

    pub async fn delete(&self, name: &str) -> Result<TaskTicket> {
        let request = self
            .authorized(self.client.delete(self.url("")))
            .json(&json!({ "name": name }));
        self.dispatch(request, "delete router").await
    }

    pub async fn images(&self) -> Result<TaskTicket> {
        let request = self.authorized(self.client.get(self.url("/image")));
        self.dispatch(request, "list images").await
    }

    async fn dispatch(&self, request: RequestBuilder, action: &str) -> Result<TaskTicket> {
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to {action}"))?;

        if response.status() != StatusCode::ACCEPTED {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to {} ({}): {}", action, status, error_text);
        }

        let status_link = response
            .headers()
            .get(reqwest::header::LINK)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let accepted: Accepted = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {action} response"))?;

        Ok(TaskTicket {
            task_id: accepted.content.task_id,
            status_link,
        })
    }

    pub async fn task(&self, task_id: &str) -> Result<TaskPoll> {
        let response = self
            .authorized(self.client.get(self.url(&format!("/task/{task_id}"))))
            .send()
            .await
            .context("Failed to get task status")?;

        match response.status() {
            StatusCode::ACCEPTED => Ok(TaskPoll::Pending),
            StatusCode::OK => {
                let body = response
                    .json()
                    .await
                    .context("Failed to parse task response")?;
                Ok(TaskPoll::Finished(body))
            }
            status => {
                let error_text = response.text().await.unwrap_or_default();
                anyhow::bail!("Failed to get task {} ({}): {}", task_id, status, error_text);
            }
        }
    }

    /// Poll until the task finishes. There is no overall deadline; provisioning
    /// can legitimately take many minutes.
    pub async fn wait(&self, task_id: &str, poll_interval: Duration) -> Result<Value> {
        loop {
            match self.task(task_id).await? {
                TaskPoll::Finished(body) => return Ok(body),
                TaskPoll::Pending => tokio::time::sleep(poll_interval).await,
            }
        }
    }

    pub async fn health(&self) -> Result<Value> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .context("Failed to reach server")?;

        if !response.status().is_success() {
            anyhow::bail!("Server unhealthy: {}", response.status());
        }
        response.json().await.context("Failed to parse health response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    const TASK_ID: &str = "5b0f7c8e-8d0c-4f53-9a0b-1b2f3f4a5c6d";

    fn accepted_body() -> String {
        json!({"user": "alice", "content": {"task-id": TASK_ID}}).to_string()
    }

    #[tokio::test]
    async fn create_sends_token_and_returns_ticket() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", ROUTE_BASE)
            .match_header(AUTH_HEADER, "tok")
            .match_body(Matcher::Json(json!({
                "name": "edge",
                "image": "1.0.32",
                "networks": ["net1", null],
            })))
            .with_status(202)
            .with_header("link", "<https://vlab/api/1/inf/router/task/x>; rel=status")
            .with_body(accepted_body())
            .create_async()
            .await;

        let client = RouterClient::new(&server.url(), Some("tok".into())).unwrap();
        let ticket = client
            .create("edge", "1.0.32", &[Some("net1".into()), None])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(ticket.task_id, TASK_ID);
        assert_eq!(
            ticket.status_link.as_deref(),
            Some("<https://vlab/api/1/inf/router/task/x>; rel=status")
        );
    }

    #[tokio::test]
    async fn rejected_request_surfaces_server_message() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", ROUTE_BASE)
            .with_status(401)
            .with_body(r#"{"error":"missing X-Auth header"}"#)
            .create_async()
            .await;

        let client = RouterClient::new(&server.url(), None).unwrap();
        let err = client.show().await.unwrap_err();

        assert!(err.to_string().contains("missing X-Auth header"));
    }

    #[tokio::test]
    async fn wait_polls_until_finished() {
        let mut server = Server::new_async().await;
        let path = format!("{ROUTE_BASE}/task/{TASK_ID}");
        let pending = server
            .mock("GET", path.as_str())
            .with_status(202)
            .with_body(json!({"status": "running"}).to_string())
            .expect(1)
            .create_async()
            .await;

        let client = RouterClient::new(&server.url(), None).unwrap();
        assert_eq!(client.task(TASK_ID).await.unwrap(), TaskPoll::Pending);
        pending.assert_async().await;
        pending.remove_async().await;

        server
            .mock("GET", path.as_str())
            .with_status(200)
            .with_body(
                json!({"status": "completed", "content": {"image": ["1.0.32"]}, "error": null})
                    .to_string(),
            )
            .create_async()
            .await;

        let body = client
            .wait(TASK_ID, Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(body["content"]["image"], json!(["1.0.32"]));
    }

    #[tokio::test]
    async fn unknown_task_is_an_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", format!("{ROUTE_BASE}/task/nope").as_str())
            .with_status(404)
            .with_body(r#"{"error":"No task with id nope"}"#)
            .create_async()
            .await;

        let client = RouterClient::new(&server.url(), None).unwrap();
        let err = client.task("nope").await.unwrap_err();
        assert!(err.to_string().contains("No task with id nope"));
    }

    #[tokio::test]
    async fn health_returns_server_status() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/health")
            .with_status(200)
            .with_body(json!({"status": "healthy", "uptime_seconds": 7}).to_string())
            .create_async()
            .await;

        let client = RouterClient::new(&server.url(), None).unwrap();
        let body = client.health().await.unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["uptime_seconds"], 7);
    }

    #[tokio::test]
    async fn unhealthy_server_is_an_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/health")
            .with_status(503)
            .create_async()
            .await;

        let client = RouterClient::new(&server.url(), None).unwrap();
        let err = client.health().await.unwrap_err();
        assert!(err.to_string().contains("Server unhealthy"));
    }
}
