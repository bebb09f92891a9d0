// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Task Dispatcher
//!
//! Turns lifecycle requests into tracked, asynchronous tasks.
//!
//! `dispatch` records the task as queued and pushes it onto a bounded queue,
//! returning the id immediately. A fixed pool of workers pulls from that
//! queue; each worker runs one task to its terminal outcome before taking the
//! next, so at most `workers` tasks are in flight. The executor runs inside a
//! spawned task so that a panic is contained: the record is marked `failed`
//! with no result and the worker carries on.
//!
//! Finished records are kept for `result_ttl` and then purged by a reaper.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::domain::node_config::WorkersConfig;
use crate::domain::repository::{RepositoryError, TaskRepository};
use crate::domain::task::{TaskId, TaskRecord, TaskRequest, TaskResult};

/// Runs one request to its terminal result.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, request: TaskRequest) -> TaskResult;
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("task queue is full")]
    QueueFull,
    #[error("dispatcher is shut down")]
    Closed,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub result_ttl: Duration,
}

impl From<&WorkersConfig> for DispatcherConfig {
    fn from(config: &WorkersConfig) -> Self {
        Self {
            workers: config.count,
            queue_capacity: config.queue_capacity,
            result_ttl: Duration::from_secs(config.result_ttl_secs),
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::from(&WorkersConfig::default())
    }
}

struct QueuedTask {
    id: TaskId,
    request: TaskRequest,
}

pub struct TaskDispatcher {
    sender: Mutex<Option<mpsc::Sender<QueuedTask>>>,
    repository: Arc<dyn TaskRepository>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    shutdown_token: CancellationToken,
}

impl TaskDispatcher {
    /// Spawn the worker pool and the reaper. Must be called inside a tokio runtime.
    pub fn start(
        executor: Arc<dyn TaskExecutor>,
        repository: Arc<dyn TaskRepository>,
        config: DispatcherConfig,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let shutdown_token = CancellationToken::new();

        // The receiver lives only in the workers, so there is always at least one.
        let workers = config.workers.max(1);
        let mut handles = Vec::with_capacity(workers + 1);
        for worker in 0..workers {
            handles.push(tokio::spawn(worker_loop(
                worker,
                rx.clone(),
                executor.clone(),
                repository.clone(),
            )));
        }
        handles.push(tokio::spawn(reaper_loop(
            repository.clone(),
            config.result_ttl,
            shutdown_token.clone(),
        )));

        info!(
            workers,
            queue_capacity = config.queue_capacity,
            "Task dispatcher started"
        );

        Arc::new(Self {
            sender: Mutex::new(Some(tx)),
            repository,
            handles: Mutex::new(handles),
            shutdown_token,
        })
    }

    /// Queue a request and return its tracking id. Never waits for a free
    /// worker or for queue space.
    pub async fn dispatch(&self, request: TaskRequest) -> Result<TaskId, DispatchError> {
        let sender = self.sender.lock().clone().ok_or(DispatchError::Closed)?;
        let permit = sender.try_reserve().map_err(|e| match e {
            mpsc::error::TrySendError::Full(()) => DispatchError::QueueFull,
            mpsc::error::TrySendError::Closed(()) => DispatchError::Closed,
        })?;

        let id = TaskId::new();
        let kind = request.kind();
        self.repository
            .save(TaskRecord::queued(id, kind, request.owner().clone()))
            .await?;
        permit.send(QueuedTask { id, request });

        metrics::counter!("vrouter_tasks_dispatched_total", "kind" => kind.as_str()).increment(1);
        debug!(task_id = %id, kind = kind.as_str(), "Task queued");
        Ok(id)
    }

    pub async fn status(&self, id: TaskId) -> Result<Option<TaskRecord>, DispatchError> {
        Ok(self.repository.find_by_id(id).await?)
    }

    /// Stop accepting work, let the workers drain the queue, and wait for them.
    pub async fn shutdown(&self) {
        self.sender.lock().take();
        self.shutdown_token.cancel();

        let handles: Vec<_> = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Dispatcher task ended abnormally: {}", e);
            }
        }
        info!("Task dispatcher stopped");
    }
}

async fn worker_loop(
    worker: usize,
    queue: Arc<tokio::sync::Mutex<mpsc::Receiver<QueuedTask>>>,
    executor: Arc<dyn TaskExecutor>,
    repository: Arc<dyn TaskRepository>,
) {
    debug!(worker, "Worker started");
    loop {
        let next = queue.lock().await.recv().await;
        let Some(task) = next else {
            break;
        };
        run_task(task, &executor, &repository).await;
    }
    debug!(worker, "Worker stopped");
}

async fn run_task(
    task: QueuedTask,
    executor: &Arc<dyn TaskExecutor>,
    repository: &Arc<dyn TaskRepository>,
) {
    let QueuedTask { id, request } = task;
    let kind = request.kind();
    let span = info_span!(
        "task",
        task_id = %id,
        kind = kind.as_str(),
        owner = %request.owner()
    );

    if let Err(e) = repository.mark_running(id).await {
        warn!(task_id = %id, "Failed to mark task running: {}", e);
    }

    let started = Instant::now();
    let executor = executor.clone();
    let joined = tokio::spawn(async move { executor.execute(request).await }.instrument(span.clone()))
        .await;

    let outcome = match joined {
        Ok(result) => {
            let outcome = if result.is_error() { "error" } else { "ok" };
            if let Err(e) = repository.complete(id, result).await {
                warn!(task_id = %id, "Failed to record task result: {}", e);
            }
            outcome
        }
        Err(join_error) => {
            span.in_scope(|| error!("Task crashed: {}", join_error));
            if let Err(e) = repository.fail(id).await {
                warn!(task_id = %id, "Failed to record task failure: {}", e);
            }
            "crashed"
        }
    };

    metrics::counter!(
        "vrouter_tasks_completed_total",
        "kind" => kind.as_str(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!("vrouter_task_duration_seconds", "kind" => kind.as_str())
        .record(started.elapsed().as_secs_f64());
}

async fn reaper_loop(
    repository: Arc<dyn TaskRepository>,
    ttl: Duration,
    shutdown_token: CancellationToken,
) {
    let period = (ttl / 4).clamp(Duration::from_secs(1), Duration::from_secs(60));
    let mut tick = interval(period);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let Ok(ttl) = chrono::Duration::from_std(ttl) else {
                    continue;
                };
                match repository.purge_finished_before(Utc::now() - ttl).await {
                    Ok(0) => {}
                    Ok(purged) => debug!(purged, "Purged finished task records"),
                    Err(e) => warn!("Task record purge failed: {}", e),
                }
            }
            _ = shutdown_token.cancelled() => break,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::instance::OwnerScope;
    use crate::domain::task::TaskStatus;
    use crate::infrastructure::repositories::InMemoryTaskRepository;
    use serde_json::json;
    use tokio::sync::Semaphore;

    /// Holds every task in `Running` until `open` is called.
    pub(crate) struct GatedExecutor {
        gate: Semaphore,
    }

    impl GatedExecutor {
        pub(crate) fn new() -> Arc<Self> {
            Arc::new(Self {
                gate: Semaphore::new(0),
            })
        }

        pub(crate) fn open(&self) {
            self.gate.add_permits(1024);
        }
    }

    #[async_trait]
    impl TaskExecutor for GatedExecutor {
        async fn execute(&self, _request: TaskRequest) -> TaskResult {
            let _permit = self.gate.acquire().await;
            TaskResult::ok(json!({}))
        }
    }

    pub(crate) async fn wait_status(dispatcher: &TaskDispatcher, id: TaskId, status: TaskStatus) {
        for _ in 0..500 {
            if let Some(record) = dispatcher.status(id).await.unwrap() {
                if record.status == status {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("task {id} never reached {status:?}");
    }

    fn image(owner: &str) -> TaskRequest {
        TaskRequest::Image {
            owner: OwnerScope::new(owner),
        }
    }

    struct EchoExecutor;

    #[async_trait]
    impl TaskExecutor for EchoExecutor {
        async fn execute(&self, request: TaskRequest) -> TaskResult {
            match request {
                TaskRequest::Image { .. } => TaskResult::ok(json!({"image": ["1.0.32"]})),
                TaskRequest::Delete { name, .. } if name == "boom" => panic!("executor blew up"),
                TaskRequest::Delete { name, .. } => {
                    TaskResult::failed(format!("No router named {name} found"))
                }
                _ => TaskResult::ok(json!({})),
            }
        }
    }

    fn config(workers: usize, queue_capacity: usize) -> DispatcherConfig {
        DispatcherConfig {
            workers,
            queue_capacity,
            result_ttl: Duration::from_secs(3600),
        }
    }

    async fn wait_terminal(dispatcher: &TaskDispatcher, id: TaskId) -> TaskRecord {
        for _ in 0..200 {
            if let Some(record) = dispatcher.status(id).await.unwrap() {
                if record.status.is_terminal() {
                    return record;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {id} never finished");
    }

    #[tokio::test]
    async fn test_dispatch_runs_to_completion() {
        let dispatcher = TaskDispatcher::start(
            Arc::new(EchoExecutor),
            Arc::new(InMemoryTaskRepository::new()),
            config(2, 8),
        );

        let id = dispatcher.dispatch(image("alice")).await.unwrap();
        let record = wait_terminal(&dispatcher, id).await;

        assert_eq!(record.status, TaskStatus::Completed);
        assert_eq!(record.result.unwrap().content, json!({"image": ["1.0.32"]}));
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_error_result_is_completed_not_failed() {
        let dispatcher = TaskDispatcher::start(
            Arc::new(EchoExecutor),
            Arc::new(InMemoryTaskRepository::new()),
            config(1, 8),
        );

        let id = dispatcher
            .dispatch(TaskRequest::Delete {
                owner: OwnerScope::new("alice"),
                name: "ghost".into(),
            })
            .await
            .unwrap();
        let record = wait_terminal(&dispatcher, id).await;

        assert_eq!(record.status, TaskStatus::Completed);
        assert_eq!(
            record.result.unwrap().error.as_deref(),
            Some("No router named ghost found")
        );
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_panic_marks_task_failed_and_worker_survives() {
        let dispatcher = TaskDispatcher::start(
            Arc::new(EchoExecutor),
            Arc::new(InMemoryTaskRepository::new()),
            config(1, 8),
        );

        let crashed = dispatcher
            .dispatch(TaskRequest::Delete {
                owner: OwnerScope::new("alice"),
                name: "boom".into(),
            })
            .await
            .unwrap();
        let record = wait_terminal(&dispatcher, crashed).await;
        assert_eq!(record.status, TaskStatus::Failed);
        assert!(record.result.is_none());

        let next = dispatcher.dispatch(image("alice")).await.unwrap();
        assert_eq!(wait_terminal(&dispatcher, next).await.status, TaskStatus::Completed);
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_full_queue_rejects_without_blocking() {
        let executor = GatedExecutor::new();
        let dispatcher = TaskDispatcher::start(
            executor.clone(),
            Arc::new(InMemoryTaskRepository::new()),
            config(1, 1),
        );

        // The only worker is busy and the single queue slot is taken.
        let running = dispatcher.dispatch(image("alice")).await.unwrap();
        wait_status(&dispatcher, running, TaskStatus::Running).await;
        let queued = dispatcher.dispatch(image("alice")).await.unwrap();

        let rejected = tokio::time::timeout(
            Duration::from_secs(1),
            dispatcher.dispatch(image("alice")),
        )
        .await
        .expect("dispatch waited for queue space");
        assert!(matches!(rejected, Err(DispatchError::QueueFull)));
        assert_eq!(
            dispatcher.status(queued).await.unwrap().unwrap().status,
            TaskStatus::Queued
        );

        executor.open();
        wait_status(&dispatcher, running, TaskStatus::Completed).await;
        wait_status(&dispatcher, queued, TaskStatus::Completed).await;
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_zero_workers_still_drains_queue() {
        let dispatcher = TaskDispatcher::start(
            Arc::new(EchoExecutor),
            Arc::new(InMemoryTaskRepository::new()),
            config(0, 1),
        );

        let id = dispatcher.dispatch(image("alice")).await.unwrap();
        assert_eq!(wait_terminal(&dispatcher, id).await.status, TaskStatus::Completed);
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_record_keeps_submitting_owner() {
        let dispatcher = TaskDispatcher::start(
            Arc::new(EchoExecutor),
            Arc::new(InMemoryTaskRepository::new()),
            config(1, 4),
        );

        let id = dispatcher.dispatch(image("bob")).await.unwrap();
        let record = wait_terminal(&dispatcher, id).await;
        assert_eq!(record.owner, OwnerScope::new("bob"));
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_dispatch_after_shutdown_is_closed() {
        let dispatcher = TaskDispatcher::start(
            Arc::new(EchoExecutor),
            Arc::new(InMemoryTaskRepository::new()),
            config(1, 4),
        );
        dispatcher.shutdown().await;

        let err = dispatcher.dispatch(image("alice")).await.unwrap_err();
        assert!(matches!(err, DispatchError::Closed));
    }
}
