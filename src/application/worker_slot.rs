//! C2 Worker Slot (spec.md §4.2): a single-assignment executor. One
//! [`WorkerSlotRuntime`] wraps one [`WorkerSlot`] model and drives its
//! assigned [`ExecutionStrategy`] to completion, translating strategy
//! events into the slot's own `task:*`/`log` event stream.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use crate::domain::models::slot::{SlotStatus, WorkerSlot};
use crate::domain::models::task::Task;
use crate::domain::ports::errors::AegisError;
use crate::domain::ports::execution::{ExecutionEvent, ExecutionStrategy};

/// Events a slot emits while Busy (spec.md §4.2): exactly one `Started`,
/// zero or more `Progress` (non-decreasing), exactly one of
/// `Completed`/`Failed`, interleaved `Log`. Nothing is emitted after the
/// terminal event of that assignment.
#[derive(Debug, Clone)]
pub enum SlotEvent {
    Started { agent_id: Uuid, task_id: Uuid },
    Progress { agent_id: Uuid, task_id: Uuid, progress: u8 },
    Log { agent_id: Uuid, message: String },
    Completed { agent_id: Uuid, task_id: Uuid, duration_ms: u64 },
    Failed { agent_id: Uuid, task_id: Uuid, reason: String, duration_ms: u64 },
    Terminated { agent_id: Uuid },
}

struct Assignment {
    agent_id: Uuid,
    cancel: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
    started_at: Instant,
    terminal_sent: bool,
}

/// Thread-safe handle around one [`WorkerSlot`]. Cheap to clone; shared
/// between the Swarm's assignment path and the health-sweep task.
#[derive(Clone)]
pub struct WorkerSlotRuntime {
    slot: Arc<Mutex<WorkerSlot>>,
    assignment: Arc<Mutex<Option<Assignment>>>,
    strategy: Arc<dyn ExecutionStrategy>,
    task_timeout_ms: u64,
}

impl WorkerSlotRuntime {
    pub fn new(index: usize, strategy: Arc<dyn ExecutionStrategy>, task_timeout_ms: u64) -> Self {
        Self {
            slot: Arc::new(Mutex::new(WorkerSlot::new(index))),
            assignment: Arc::new(Mutex::new(None)),
            strategy,
            task_timeout_ms,
        }
    }

    pub async fn index(&self) -> usize {
        self.slot.lock().await.index
    }

    pub async fn is_available(&self) -> bool {
        self.slot.lock().await.is_available()
    }

    pub async fn status(&self) -> SlotStatus {
        self.slot.lock().await.status
    }

    pub async fn current_agent(&self) -> Option<Uuid> {
        self.slot.lock().await.current_agent
    }

    pub async fn metrics(&self) -> crate::domain::models::slot::SlotMetrics {
        self.slot.lock().await.metrics
    }

    /// Assigns `task` to this slot, only valid while `Available`. Spawns a
    /// background task driving the execution strategy and forwarding its
    /// events (plus the slot's own started/terminal events) to `events_tx`.
    pub async fn assign_task(
        &self,
        agent_id: Uuid,
        task: Task,
        workspace_path: String,
        events_tx: mpsc::Sender<SlotEvent>,
    ) -> Result<(), AegisError> {
        let mut slot = self.slot.lock().await;
        if !slot.is_available() {
            return Err(AegisError::SlotBusy(slot.index));
        }
        slot.assign(agent_id);
        drop(slot);

        let cancel = CancellationToken::new();
        let strategy = Arc::clone(&self.strategy);
        let slot_ref = Arc::clone(&self.slot);
        let assignment_ref = Arc::clone(&self.assignment);
        let task_id = task.id;
        let cancel_for_task = cancel.clone();
        let started_at = Instant::now();

        let _ = events_tx.send(SlotEvent::Started { agent_id, task_id }).await;

        let handle = tokio::spawn(async move {
            let (strategy_tx, mut strategy_rx) = mpsc::channel(64);
            let exec = strategy.execute(&task, &workspace_path, cancel_for_task, strategy_tx);
            tokio::pin!(exec);

            let outcome = loop {
                tokio::select! {
                    biased;
                    maybe_event = strategy_rx.recv() => {
                        match maybe_event {
                            Some(ExecutionEvent::Progress(p)) => {
                                let _ = events_tx.send(SlotEvent::Progress { agent_id, task_id, progress: p }).await;
                            }
                            Some(ExecutionEvent::Log(message)) => {
                                let _ = events_tx.send(SlotEvent::Log { agent_id, message }).await;
                            }
                            None => {}
                        }
                    }
                    result = &mut exec => break result,
                }
            };

            let duration_ms = started_at.elapsed().as_millis() as u64;

            let mut slot = slot_ref.lock().await;
            let mut assignment = assignment_ref.lock().await;
            let already_terminal = assignment.as_ref().map(|a| a.terminal_sent).unwrap_or(true);
            if !already_terminal {
                match outcome {
                    Ok(()) => {
                        slot.metrics.record_completion(duration_ms);
                        let _ = events_tx.send(SlotEvent::Completed { agent_id, task_id, duration_ms }).await;
                    }
                    Err(err) => {
                        slot.metrics.record_failure(duration_ms);
                        let _ = events_tx.send(SlotEvent::Failed { agent_id, task_id, reason: err.to_string(), duration_ms }).await;
                    }
                }
                if let Some(a) = assignment.as_mut() {
                    a.terminal_sent = true;
                }
            }
            slot.release();
            *assignment = None;
        });

        *self.assignment.lock().await = Some(Assignment {
            agent_id,
            cancel,
            handle,
            started_at,
            terminal_sent: false,
        });

        Ok(())
    }

    /// Cancels the running task if any, tears down, emits a terminal
    /// failure if no terminal event has been observed yet, and resets the
    /// slot to Available (spec.md §4.2).
    pub async fn terminate(&self, events_tx: mpsc::Sender<SlotEvent>) {
        let taken = self.assignment.lock().await.take();
        let Some(assignment) = taken else {
            let mut slot = self.slot.lock().await;
            slot.release();
            return;
        };

        assignment.cancel.cancel();
        let _ = assignment.handle.await;

        if !assignment.terminal_sent {
            let duration_ms = assignment.started_at.elapsed().as_millis() as u64;
            let mut slot = self.slot.lock().await;
            slot.metrics.record_failure(duration_ms);
            let _ = events_tx
                .send(SlotEvent::Failed { agent_id: assignment.agent_id, task_id: Uuid::nil(), reason: "terminated".into(), duration_ms })
                .await;
        }
        let _ = events_tx.send(SlotEvent::Terminated { agent_id: assignment.agent_id }).await;

        let mut slot = self.slot.lock().await;
        slot.release();
    }

    /// Returns false if the assignment has run longer than
    /// `task_timeout_ms`, or the strategy itself reports unhealthy
    /// (containerised mode: container not Running). A pure query: does not
    /// itself change slot status — the Swarm decides what to do with the
    /// result (spec.md §4.2).
    pub async fn check_health(&self) -> bool {
        let over_ceiling = {
            let assignment = self.assignment.lock().await;
            assignment.as_ref().map(|a| a.started_at.elapsed().as_millis() as u64 > self.task_timeout_ms).unwrap_or(false)
        };
        if over_ceiling {
            return false;
        }
        self.strategy.is_healthy().await
    }

    /// Marks the slot Unhealthy. Called by the Swarm once it has decided to
    /// act on a failed [`check_health`](Self::check_health) result.
    pub async fn mark_unhealthy(&self) {
        let mut slot = self.slot.lock().await;
        slot.mark_unhealthy();
        warn!(target: "aegis::swarm", slot_index = slot.index, "slot marked unhealthy");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::execution::simulated::SimulatedStrategy;
    use crate::domain::models::task::{Priority, TaskType};
    use std::collections::HashSet;

    #[tokio::test]
    async fn assign_emits_started_progress_then_completed() {
        let strategy = Arc::new(SimulatedStrategy::new());
        let slot = WorkerSlotRuntime::new(0, strategy, 60_000);
        let (tx, mut rx) = mpsc::channel(64);
        let task = Task::new("t", "d", Priority::Medium, TaskType::Implement, HashSet::new());
        let agent_id = Uuid::new_v4();

        slot.assign_task(agent_id, task, "/tmp".into(), tx).await.unwrap();

        let mut saw_started = false;
        let mut saw_completed = false;
        while let Some(event) = rx.recv().await {
            match event {
                SlotEvent::Started { .. } => saw_started = true,
                SlotEvent::Completed { .. } => {
                    saw_completed = true;
                    break;
                }
                SlotEvent::Failed { .. } => panic!("unexpected failure"),
                _ => {}
            }
        }
        assert!(saw_started);
        assert!(saw_completed);
        assert!(slot.is_available().await);
    }

    #[tokio::test]
    async fn assign_while_busy_fails_with_slot_busy() {
        let strategy = Arc::new(SimulatedStrategy::new());
        let slot = WorkerSlotRuntime::new(0, strategy, 60_000);
        let (tx, _rx) = mpsc::channel(64);
        let task = Task::new("t", "d", Priority::Medium, TaskType::Implement, HashSet::new());
        slot.assign_task(Uuid::new_v4(), task, "/tmp".into(), tx.clone()).await.unwrap();

        let task2 = Task::new("t2", "d", Priority::Medium, TaskType::Implement, HashSet::new());
        let result = slot.assign_task(Uuid::new_v4(), task2, "/tmp".into(), tx).await;
        assert!(matches!(result, Err(AegisError::SlotBusy(0))));
    }

    #[tokio::test]
    async fn terminate_releases_slot_and_emits_terminated() {
        let strategy = Arc::new(SimulatedStrategy::new());
        let slot = WorkerSlotRuntime::new(0, strategy, 60_000);
        let (tx, mut rx) = mpsc::channel(64);
        let task = Task::new("t", "d", Priority::Medium, TaskType::Implement, HashSet::new());
        slot.assign_task(Uuid::new_v4(), task, "/tmp".into(), tx.clone()).await.unwrap();

        slot.terminate(tx).await;
        assert!(slot.is_available().await);

        let mut saw_terminated = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, SlotEvent::Terminated { .. }) {
                saw_terminated = true;
            }
        }
        assert!(saw_terminated);
    }
}
