// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Task records only live as long as a caller may poll for them, so the
//! process-local map below is the single implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::repository::{RepositoryError, TaskRepository};
use crate::domain::task::{TaskId, TaskRecord, TaskResult};

#[derive(Clone, Default)]
pub struct InMemoryTaskRepository {
    tasks: Arc<RwLock<HashMap<TaskId, TaskRecord>>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }

    fn update(&self, id: TaskId, f: impl FnOnce(&mut TaskRecord)) -> Result<(), RepositoryError> {
        let mut tasks = self.tasks.write();
        let record = tasks.get_mut(&id).ok_or(RepositoryError::NotFound(id))?;
        f(record);
        Ok(())
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn save(&self, record: TaskRecord) -> Result<(), RepositoryError> {
        self.tasks.write().insert(record.id, record);
        Ok(())
    }

    async fn find_by_id(&self, id: TaskId) -> Result<Option<TaskRecord>, RepositoryError> {
        Ok(self.tasks.read().get(&id).cloned())
    }

    async fn mark_running(&self, id: TaskId) -> Result<(), RepositoryError> {
        self.update(id, |record| record.start())
    }

    async fn complete(&self, id: TaskId, result: TaskResult) -> Result<(), RepositoryError> {
        self.update(id, |record| record.complete(result))
    }

    async fn fail(&self, id: TaskId) -> Result<(), RepositoryError> {
        self.update(id, |record| record.fail())
    }

    async fn purge_finished_before(&self, cutoff: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let mut tasks = self.tasks.write();
        let before = tasks.len();
        tasks.retain(|_, record| !matches!(record.finished_at, Some(at) if at < cutoff));
        Ok(before - tasks.len())
    }
}
