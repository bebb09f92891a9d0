// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Task Repository Interface
//!
//! Instances are never persisted; the only state vrouter keeps is the
//! outcome of dispatched tasks, held until the caller polls for it.
//! Implemented in `crate::infrastructure::repositories`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::task::{TaskId, TaskRecord, TaskResult};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("task not found: {0}")]
    NotFound(TaskId),
    #[error("storage error: {0}")]
    Storage(String),
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Save task record (create or replace)
    async fn save(&self, record: TaskRecord) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: TaskId) -> Result<Option<TaskRecord>, RepositoryError>;

    /// Mark a queued task as running
    async fn mark_running(&self, id: TaskId) -> Result<(), RepositoryError>;

    /// Record the terminal result of a task
    async fn complete(&self, id: TaskId, result: TaskResult) -> Result<(), RepositoryError>;

    /// Mark a task as crashed, with no result
    async fn fail(&self, id: TaskId) -> Result<(), RepositoryError>;

    /// Drop finished records older than `cutoff`; returns how many were removed
    async fn purge_finished_before(&self, cutoff: DateTime<Utc>) -> Result<usize, RepositoryError>;
}
