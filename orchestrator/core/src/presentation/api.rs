// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP API
//!
//! Every lifecycle call is answered with `202 Accepted`, a task id and a
//! `Link` header pointing at the task's status URL. Callers poll that URL
//! until the task reaches a terminal state.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::application::dispatcher::{DispatchError, TaskDispatcher};
use crate::domain::instance::OwnerScope;
use crate::domain::task::{TaskId, TaskRequest, TaskStatus};
use crate::presentation::auth::{AuthError, TokenVerifier};

pub const ROUTE_BASE: &str = "/api/1/inf/router";

const MIN_NETWORKS: usize = 2;
const MAX_NETWORKS: usize = 4;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<TaskDispatcher>,
    pub verifier: Arc<TokenVerifier>,
    /// Public URL prefix for status links
    pub base_url: String,
    pub start_time: Instant,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            ROUTE_BASE,
            get(show_handler).post(create_handler).delete(delete_handler),
        )
        .route(&format!("{ROUTE_BASE}/image"), get(image_handler))
        .route(&format!("{ROUTE_BASE}/task/{{id}}"), get(task_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    Validation(String),
    NotFound(String),
    Unavailable(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m),
            ApiError::Validation(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Unauthorized(err.to_string())
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::QueueFull | DispatchError::Closed => {
                ApiError::Unavailable(err.to_string())
            }
            DispatchError::Repository(e) => ApiError::Internal(e.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRouterRequest {
    pub name: String,
    pub image: String,
    pub networks: Vec<Option<String>>,
}

impl CreateRouterRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::Validation("name must not be empty".into()));
        }
        if self.image.is_empty() || self.image.contains('/') {
            return Err(ApiError::Validation(format!("invalid image '{}'", self.image)));
        }
        if !(MIN_NETWORKS..=MAX_NETWORKS).contains(&self.networks.len()) {
            return Err(ApiError::Validation(format!(
                "networks must list {MIN_NETWORKS} to {MAX_NETWORKS} entries"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteRouterRequest {
    pub name: String,
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| ApiError::Validation(e.body_text()))
}

async fn accept(
    state: &AppState,
    owner: &OwnerScope,
    request: TaskRequest,
) -> Result<Response, ApiError> {
    let id = state.dispatcher.dispatch(request).await?;
    let link = format!("<{}{}/task/{}>; rel=status", state.base_url, ROUTE_BASE, id);

    let mut response = (
        StatusCode::ACCEPTED,
        Json(json!({
            "user": owner.as_str(),
            "content": { "task-id": id.to_string() },
        })),
    )
        .into_response();
    match HeaderValue::from_str(&link) {
        Ok(value) => {
            response.headers_mut().insert(header::LINK, value);
        }
        Err(e) => warn!("Cannot encode status link {}: {}", link, e),
    }
    Ok(response)
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "uptime_seconds": state.start_time.elapsed().as_secs(),
    }))
}

async fn show_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let owner = state.verifier.authenticate(&headers)?;
    accept(&state, &owner, TaskRequest::Show { owner: owner.clone() }).await
}

async fn create_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<CreateRouterRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let owner = state.verifier.authenticate(&headers)?;
    let request = body(payload)?;
    request.validate()?;

    let task = TaskRequest::Create {
        owner: owner.clone(),
        name: request.name,
        image: request.image,
        networks: request.networks,
    };
    accept(&state, &owner, task).await
}

async fn delete_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<DeleteRouterRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let owner = state.verifier.authenticate(&headers)?;
    let request = body(payload)?;
    if request.name.trim().is_empty() {
        return Err(ApiError::Validation("name must not be empty".into()));
    }

    let task = TaskRequest::Delete {
        owner: owner.clone(),
        name: request.name,
    };
    accept(&state, &owner, task).await
}

async fn image_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let owner = state.verifier.authenticate(&headers)?;
    accept(&state, &owner, TaskRequest::Image { owner: owner.clone() }).await
}

async fn task_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let owner = state.verifier.authenticate(&headers)?;
    let not_found = || ApiError::NotFound(format!("No task with id {id}"));

    let task_id = TaskId::parse(&id).ok_or_else(not_found)?;
    let record = state
        .dispatcher
        .status(task_id)
        .await?
        .filter(|record| record.owner == owner)
        .ok_or_else(not_found)?;

    let response = match record.status {
        TaskStatus::Queued | TaskStatus::Running => (
            StatusCode::ACCEPTED,
            Json(json!({
                "user": owner.as_str(),
                "status": record.status,
                "content": { "task-id": id },
            })),
        ),
        TaskStatus::Completed | TaskStatus::Failed => {
            let (content, error, params) = match record.result {
                Some(result) => (result.content, result.error, result.params),
                None => (
                    json!({}),
                    Some("Task failed unexpectedly".to_string()),
                    Default::default(),
                ),
            };
            (
                StatusCode::OK,
                Json(json!({
                    "user": owner.as_str(),
                    "status": record.status,
                    "content": content,
                    "error": error,
                    "params": params,
                })),
            )
        }
    };
    Ok(response.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dispatcher::tests::{wait_status, GatedExecutor};
    use crate::application::dispatcher::{DispatcherConfig, TaskExecutor};
    use crate::domain::task::TaskResult;
    use crate::infrastructure::repositories::InMemoryTaskRepository;
    use crate::presentation::auth::tests::{token_for, SECRET};
    use crate::presentation::auth::AUTH_HEADER;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    struct CannedExecutor;

    #[async_trait]
    impl TaskExecutor for CannedExecutor {
        async fn execute(&self, request: TaskRequest) -> TaskResult {
            match request {
                TaskRequest::Image { .. } => TaskResult::ok(json!({"image": ["1.0.32"]})),
                _ => TaskResult::ok(json!({})),
            }
        }
    }

    fn test_app(queue_capacity: usize, workers: usize) -> Router {
        test_app_with(Arc::new(CannedExecutor), queue_capacity, workers).0
    }

    fn test_app_with(
        executor: Arc<dyn TaskExecutor>,
        queue_capacity: usize,
        workers: usize,
    ) -> (Router, Arc<TaskDispatcher>) {
        let dispatcher = TaskDispatcher::start(
            executor,
            Arc::new(InMemoryTaskRepository::new()),
            DispatcherConfig {
                workers,
                queue_capacity,
                result_ttl: Duration::from_secs(60),
            },
        );
        let router = app(AppState {
            dispatcher: dispatcher.clone(),
            verifier: Arc::new(TokenVerifier::new(SECRET)),
            base_url: "https://vlab.example.com".into(),
            start_time: Instant::now(),
        });
        (router, dispatcher)
    }

    fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        request_as("alice", method, uri, body)
    }

    fn request_as(user: &str, method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(AUTH_HEADER, token_for(user, SECRET));
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_returns_202_with_link() {
        let app = test_app(8, 1);
        let response = app
            .oneshot(request("GET", ROUTE_BASE, None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let link = response.headers()[header::LINK].to_str().unwrap().to_string();
        let body = json_body(response).await;
        let task_id = body["content"]["task-id"].as_str().unwrap();

        assert_eq!(body["user"], "alice");
        assert_eq!(
            link,
            format!("<https://vlab.example.com/api/1/inf/router/task/{task_id}>; rel=status")
        );
    }

    #[tokio::test]
    async fn test_missing_token_is_401() {
        let app = test_app(8, 1);
        let response = app
            .oneshot(
                Request::builder()
                    .uri(ROUTE_BASE)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_validates_network_count() {
        let app = test_app(8, 1);
        let response = app
            .oneshot(request(
                "POST",
                ROUTE_BASE,
                Some(json!({"name": "myRouter", "image": "1.0.32", "networks": ["net1"]})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_accepts_optional_trailing_networks() {
        let app = test_app(8, 1);
        let response = app
            .oneshot(request(
                "POST",
                ROUTE_BASE,
                Some(json!({
                    "name": "myRouter",
                    "image": "1.0.32",
                    "networks": ["net1", "net2", null, ""]
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_delete_requires_name() {
        let app = test_app(8, 1);
        let response = app
            .oneshot(request("DELETE", ROUTE_BASE, Some(json!({}))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    async fn task_id_of(response: Response) -> String {
        json_body(response).await["content"]["task-id"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_full_queue_is_503() {
        let executor = GatedExecutor::new();
        let (app, dispatcher) = test_app_with(executor.clone(), 1, 1);
        let images = format!("{ROUTE_BASE}/image");

        let first = app.clone().oneshot(request("GET", &images, None)).await.unwrap();
        assert_eq!(first.status(), StatusCode::ACCEPTED);
        let running = TaskId::parse(&task_id_of(first).await).unwrap();
        wait_status(&dispatcher, running, TaskStatus::Running).await;

        let second = app.clone().oneshot(request("GET", &images, None)).await.unwrap();
        assert_eq!(second.status(), StatusCode::ACCEPTED);

        let third = app.oneshot(request("GET", &images, None)).await.unwrap();
        assert_eq!(third.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(third).await["error"], "task queue is full");

        executor.open();
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_other_tenants_task_is_404() {
        let app = test_app(8, 1);
        let response = app
            .clone()
            .oneshot(request("GET", ROUTE_BASE, None))
            .await
            .unwrap();
        let uri = format!("{ROUTE_BASE}/task/{}", task_id_of(response).await);

        let response = app
            .clone()
            .oneshot(request_as("mallory", "GET", &uri, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app.oneshot(request("GET", &uri, None)).await.unwrap();
        assert_ne!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_poll_until_complete() {
        let app = test_app(8, 1);
        let response = app
            .clone()
            .oneshot(request("GET", &format!("{ROUTE_BASE}/image"), None))
            .await
            .unwrap();
        let task_id = json_body(response).await["content"]["task-id"]
            .as_str()
            .unwrap()
            .to_string();

        let uri = format!("{ROUTE_BASE}/task/{task_id}");
        for _ in 0..200 {
            let response = app.clone().oneshot(request("GET", &uri, None)).await.unwrap();
            if response.status() == StatusCode::OK {
                let body = json_body(response).await;
                assert_eq!(body["content"], json!({"image": ["1.0.32"]}));
                assert_eq!(body["error"], Value::Null);
                return;
            }
            assert_eq!(response.status(), StatusCode::ACCEPTED);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task never completed");
    }

    #[tokio::test]
    async fn test_unknown_task_is_404() {
        let app = test_app(8, 1);
        let uri = format!("{ROUTE_BASE}/task/{}", TaskId::new());
        let response = app.oneshot(request("GET", &uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let app = test_app(8, 1);
        let response = app
            .oneshot(request("GET", &format!("{ROUTE_BASE}/task/not-a-uuid"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
