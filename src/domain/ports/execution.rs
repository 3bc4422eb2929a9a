//! The Worker Slot's execution seam (spec.md §4.2): a slot chooses between a
//! simulated strategy and a containerised one at configuration time. Both
//! speak the same narrow protocol so the slot itself stays agnostic of how
//! progress is produced.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::errors::AegisError;
use crate::domain::models::task::Task;

/// Progress/log chatter emitted by a running execution. `Terminated` is
/// reserved for the strategy's own bookkeeping; the slot decides whether an
/// explicit `terminate()` produced it.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    Progress(u8),
    Log(String),
}

/// One task execution, from the slot's point of view. Implementors run
/// until completion, failure, or cancellation via the supplied token; they
/// never decide slot status — only report outcomes up through `events` and
/// the returned `Result`.
#[async_trait]
pub trait ExecutionStrategy: Send + Sync {
    /// Runs `task` inside `workspace_path`, pushing [`ExecutionEvent`]s to
    /// `events` as they occur. Returns `Ok(())` on success, `Err` with a
    /// human-readable reason on failure. Cancellation via `cancel` must
    /// return promptly with an `Err` describing cancellation, not hang.
    async fn execute(
        &self,
        task: &Task,
        workspace_path: &str,
        cancel: CancellationToken,
        events: mpsc::Sender<ExecutionEvent>,
    ) -> Result<(), AegisError>;

    /// Whether the in-flight execution this strategy is running still looks
    /// alive. The simulated strategy always reports healthy; the
    /// containerised one checks the container is still `Running`.
    async fn is_healthy(&self) -> bool {
        true
    }
}

/// Uuid helper kept here so strategy implementations can stamp log lines
/// with a stable correlation id without importing the task module directly.
pub fn correlation_id(task: &Task) -> Uuid {
    task.id
}
