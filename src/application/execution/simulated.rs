//! Simulated execution strategy (spec.md §4.2): a synthesised phase
//! timeline with monotonically non-decreasing progress, used when
//! `container.enabled=false`. Writes an output JSON file to the
//! workspace so downstream consumers have something to read.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::models::task::Task;
use crate::domain::ports::errors::AegisError;
use crate::domain::ports::execution::{ExecutionEvent, ExecutionStrategy};

/// Phases advance progress in fixed steps; each step sleeps briefly so the
/// slot produces an observable `task:progress` stream instead of jumping
/// straight to 100.
const STEPS: [u8; 5] = [10, 35, 60, 85, 100];
const STEP_DELAY: Duration = Duration::from_millis(150);

pub struct SimulatedStrategy {
    /// Task titles in this set fail on their first attempt (`retry_count ==
    /// 0`) only, then succeed on retry — grounds scenario 4 (transient task
    /// failure) without needing real process execution.
    pub scripted_failures: Vec<String>,
    /// Task titles in this set fail on every attempt, exhausting the retry
    /// budget — grounds scenario 3 (critical failure short-circuit).
    pub permanent_failures: Vec<String>,
}

impl SimulatedStrategy {
    pub fn new() -> Self {
        Self { scripted_failures: Vec::new(), permanent_failures: Vec::new() }
    }

    pub fn with_scripted_failures(mut self, titles: Vec<String>) -> Self {
        self.scripted_failures = titles;
        self
    }

    pub fn with_permanent_failures(mut self, titles: Vec<String>) -> Self {
        self.permanent_failures = titles;
        self
    }
}

impl Default for SimulatedStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionStrategy for SimulatedStrategy {
    async fn execute(
        &self,
        task: &Task,
        workspace_path: &str,
        cancel: CancellationToken,
        events: mpsc::Sender<ExecutionEvent>,
    ) -> Result<(), AegisError> {
        let _ = events.send(ExecutionEvent::Log(format!("starting simulated execution of {}", task.title))).await;

        for &progress in &STEPS {
            if cancel.is_cancelled() {
                return Err(AegisError::IoFailure("cancelled".to_string()));
            }
            tokio::select! {
                _ = tokio::time::sleep(STEP_DELAY) => {}
                () = cancel.cancelled() => {
                    return Err(AegisError::IoFailure("cancelled".to_string()));
                }
            }
            let _ = events.send(ExecutionEvent::Progress(progress)).await;
        }

        if self.permanent_failures.contains(&task.title) || (task.retry_count == 0 && self.scripted_failures.contains(&task.title)) {
            return Err(AegisError::IoFailure(format!("scripted failure for task {}", task.title)));
        }

        let output_path = std::path::Path::new(workspace_path).join(".aegis").join(format!("{}.json", task.id));
        let payload = json!({ "taskId": task.id, "title": task.title, "status": "completed" });
        if let Ok(bytes) = serde_json::to_vec_pretty(&payload) {
            let _ = tokio::fs::write(output_path, bytes).await;
        }

        Ok(())
    }
}
