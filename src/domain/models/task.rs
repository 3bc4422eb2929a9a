//! Task domain model.
//!
//! A task is one node of a mission's dependency DAG, the smallest unit the
//! orchestrator hands to a worker slot. The orchestrator never interprets a
//! task's content — it only tracks status, dependencies and retry budget.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Priority of a mission or task. Ordered so `Critical > High > Medium > Low`
/// under the derived `Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

/// The decomposed task's role in the mission pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Scaffold,
    Implement,
    Test,
    Review,
    Document,
}

impl TaskType {
    /// Default retry budget for this task type (spec.md §4.4).
    pub fn default_max_retries(self) -> u32 {
        match self {
            Self::Scaffold => 1,
            Self::Implement | Self::Test | Self::Review | Self::Document => 3,
        }
    }

    /// Coarser phase label surfaced to subscribers.
    pub fn phase(self) -> &'static str {
        match self {
            Self::Scaffold => "scaffold",
            Self::Implement => "implement",
            Self::Test => "test",
            Self::Review => "review",
            Self::Document => "document",
        }
    }
}

/// Status of a task within its mission's four disjoint buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// A decomposed unit of work inside a mission's DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub dependencies: HashSet<Uuid>,
    pub task_type: TaskType,
    pub phase: String,
    pub status: TaskStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        priority: Priority,
        task_type: TaskType,
        dependencies: HashSet<Uuid>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            priority,
            dependencies,
            task_type,
            phase: task_type.phase().to_string(),
            status: TaskStatus::Pending,
            retry_count: 0,
            max_retries: task_type.default_max_retries(),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this task's dependencies are all present in `completed`.
    pub fn is_ready(&self, completed: &HashSet<Uuid>) -> bool {
        self.status == TaskStatus::Pending && self.dependencies.iter().all(|d| completed.contains(d))
    }

    /// Whether this task can be retried (failed, budget remaining).
    pub fn can_retry(&self) -> bool {
        self.status == TaskStatus::Failed && self.retry_count < self.max_retries
    }

    pub fn mark_in_progress(&mut self) {
        self.status = TaskStatus::InProgress;
        self.updated_at = Utc::now();
    }

    pub fn mark_completed(&mut self) {
        self.status = TaskStatus::Completed;
        self.updated_at = Utc::now();
    }

    /// Move back to Pending and bump the retry counter. Caller must check
    /// [`can_retry`](Self::can_retry) first.
    pub fn retry(&mut self) {
        self.retry_count += 1;
        self.status = TaskStatus::Pending;
        self.updated_at = Utc::now();
    }

    pub fn mark_failed(&mut self) {
        self.status = TaskStatus::Failed;
        self.updated_at = Utc::now();
    }
}
