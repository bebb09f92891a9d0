// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use crate::domain::instance::OwnerScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Show,
    Create,
    Delete,
    Image,
}

impl TaskKind {
    /// Queue name used in logs and metric labels (`router.show`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Show => "router.show",
            TaskKind::Create => "router.create",
            TaskKind::Delete => "router.delete",
            TaskKind::Image => "router.image",
        }
    }
}

/// A lifecycle request, one variant per task kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TaskRequest {
    Show {
        owner: OwnerScope,
    },
    Create {
        owner: OwnerScope,
        name: String,
        image: String,
        networks: Vec<Option<String>>,
    },
    Delete {
        owner: OwnerScope,
        name: String,
    },
    Image {
        owner: OwnerScope,
    },
}

impl TaskRequest {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskRequest::Show { .. } => TaskKind::Show,
            TaskRequest::Create { .. } => TaskKind::Create,
            TaskRequest::Delete { .. } => TaskKind::Delete,
            TaskRequest::Image { .. } => TaskKind::Image,
        }
    }

    /// Tenant that submitted the request.
    pub fn owner(&self) -> &OwnerScope {
        match self {
            TaskRequest::Show { owner }
            | TaskRequest::Create { owner, .. }
            | TaskRequest::Delete { owner, .. }
            | TaskRequest::Image { owner } => owner,
        }
    }
}

/// Normalized task outcome: `{content, error, params}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub content: Value,
    pub error: Option<String>,
    /// Reserved for echoing caller context; empty unless set explicitly.
    pub params: Map<String, Value>,
}

impl TaskResult {
    pub fn ok(content: Value) -> Self {
        Self {
            content,
            error: None,
            params: Map::new(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            content: Value::Object(Map::new()),
            error: Some(message.into()),
            params: Map::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Running,
    /// Ran to a terminal result (which may carry an error message).
    Completed,
    /// Crashed without producing a result.
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub kind: TaskKind,
    /// Only this tenant may read the record.
    pub owner: OwnerScope,
    pub status: TaskStatus,
    pub result: Option<TaskResult>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    pub fn queued(id: TaskId, kind: TaskKind, owner: OwnerScope) -> Self {
        Self {
            id,
            kind,
            owner,
            status: TaskStatus::Queued,
            result: None,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn start(&mut self) {
        self.status = TaskStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Record the single terminal outcome. Later calls are ignored.
    pub fn complete(&mut self, result: TaskResult) {
        if self.status.is_terminal() {
            return;
        }
        self.status = TaskStatus::Completed;
        self.result = Some(result);
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self) {
        if self.status.is_terminal() {
            return;
        }
        self.status = TaskStatus::Failed;
        self.finished_at = Some(Utc::now());
    }
}
