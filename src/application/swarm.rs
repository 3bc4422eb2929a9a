//! Swarm (C3, spec.md §4.3): a fixed-size pool of worker slots plus the live
//! agent table. Assigns tasks to the lowest-indexed available slot, fans
//! slot events up into agent/task events, and runs the periodic health
//! sweep.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::execution::{ContainerizedStrategy, SimulatedStrategy};
use crate::application::worker_slot::{SlotEvent, WorkerSlotRuntime};
use crate::domain::models::agent::{Agent, AgentStatus};
use crate::domain::models::config::Config;
use crate::domain::models::event::{Event, EventKind};
use crate::domain::models::slot::SlotStatus;
use crate::domain::models::task::Task;
use crate::domain::ports::errors::AegisError;
use crate::domain::ports::execution::ExecutionStrategy;

/// A point-in-time view of one slot, for the `getSwarm` control operation.
#[derive(Debug, Clone)]
pub struct SlotView {
    pub index: usize,
    pub status: SlotStatus,
    pub agent_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    pub task_title: Option<String>,
    pub progress: u8,
    pub started_at: Option<DateTime<Utc>>,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub avg_execution_ms: f64,
}

struct Inner {
    agents: HashMap<Uuid, Agent>,
}

/// Fixed-size pool of `N` [`WorkerSlotRuntime`]s plus the live agent
/// registry. Cheap to clone; shared between the mission scheduling loops
/// and the health-sweep task.
#[derive(Clone)]
pub struct Swarm {
    slots: Arc<Vec<WorkerSlotRuntime>>,
    inner: Arc<Mutex<Inner>>,
    events_tx: mpsc::Sender<Event>,
}

impl Swarm {
    pub fn new(config: &Config, events_tx: mpsc::Sender<Event>) -> Self {
        let slots = (0..config.swarm.max_workers)
            .map(|index| {
                let strategy: Arc<dyn ExecutionStrategy> = if config.container.enabled {
                    Arc::new(ContainerizedStrategy::new(&config.container))
                } else {
                    Arc::new(SimulatedStrategy::new())
                };
                WorkerSlotRuntime::new(index, strategy, config.swarm.task_timeout_ms)
            })
            .collect();

        Self {
            slots: Arc::new(slots),
            inner: Arc::new(Mutex::new(Inner { agents: HashMap::new() })),
            events_tx,
        }
    }

    /// Builds a swarm from caller-supplied strategies, one per slot, instead
    /// of deriving them from `config.container`. Used by integration tests
    /// that need deterministic scripted failures on specific slots.
    #[cfg(any(test, feature = "test-support"))]
    pub fn with_strategies(strategies: Vec<Arc<dyn ExecutionStrategy>>, task_timeout_ms: u64, events_tx: mpsc::Sender<Event>) -> Self {
        let slots = strategies.into_iter().enumerate().map(|(index, strategy)| WorkerSlotRuntime::new(index, strategy, task_timeout_ms)).collect();
        Self {
            slots: Arc::new(slots),
            inner: Arc::new(Mutex::new(Inner { agents: HashMap::new() })),
            events_tx,
        }
    }

    pub fn total_slots(&self) -> usize {
        self.slots.len()
    }

    /// Assigns `task` to the first Available slot, scanning by index
    /// (spec.md §4.3: "deterministic on slot index"). Returns `NoSlot`
    /// without side effects when none are free.
    pub async fn spawn_agent(&self, task: Task, mission_id: Uuid, workspace_path: String) -> Result<Agent, AegisError> {
        for slot in self.slots.iter() {
            if !slot.is_available().await {
                continue;
            }

            let agent = Agent::new(slot.index().await, mission_id, task.id, task.title.clone());
            let agent_id = agent.id;

            let (slot_tx, slot_rx) = mpsc::channel(128);
            match slot.assign_task(agent_id, task.clone(), workspace_path, slot_tx).await {
                Ok(()) => {
                    let mut inner = self.inner.lock().await;
                    inner.agents.insert(agent_id, agent.clone());
                    drop(inner);

                    let _ = self
                        .events_tx
                        .send(Event::new(
                            mission_id,
                            EventKind::AgentSpawned { agent_id, task_id: task.id, slot_index: agent.slot_index },
                        ))
                        .await;

                    self.spawn_forwarder(agent_id, mission_id, slot_rx);
                    return Ok(agent);
                }
                Err(AegisError::SlotBusy(_)) => continue,
                Err(other) => return Err(other),
            }
        }
        Err(AegisError::NoSlot)
    }

    /// Forwards one slot's event stream into agent/task events per the
    /// translation table in spec.md §4.3, appending `log` events to the
    /// agent's bounded ring first.
    fn spawn_forwarder(&self, agent_id: Uuid, mission_id: Uuid, mut slot_rx: mpsc::Receiver<SlotEvent>) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let events_tx = self.events_tx.clone();

        tokio::spawn(async move {
            while let Some(event) = slot_rx.recv().await {
                match event {
                    SlotEvent::Started { agent_id, task_id } => {
                        let mut guard = inner.lock().await;
                        if let Some(agent) = guard.agents.get_mut(&agent_id) {
                            let previous = agent.status;
                            if agent.transition_to(AgentStatus::Coding).is_ok() {
                                drop(guard);
                                let _ = events_tx
                                    .send(Event::new(
                                        mission_id,
                                        EventKind::AgentStatusChanged { agent_id, previous_status: previous, new_status: AgentStatus::Coding },
                                    ))
                                    .await;
                                let _ = events_tx.send(Event::new(mission_id, EventKind::AgentTaskStarted { agent_id, task_id })).await;
                                let _ = events_tx.send(Event::new(mission_id, EventKind::TaskStarted { task_id, agent_id })).await;
                            }
                        }
                    }
                    SlotEvent::Progress { agent_id, task_id, progress } => {
                        let mut guard = inner.lock().await;
                        if let Some(agent) = guard.agents.get_mut(&agent_id) {
                            agent.set_progress(progress);
                        }
                        drop(guard);
                        let _ = events_tx.send(Event::new(mission_id, EventKind::TaskProgress { task_id, agent_id, progress })).await;
                    }
                    SlotEvent::Log { agent_id, message } => {
                        let mut guard = inner.lock().await;
                        if let Some(agent) = guard.agents.get_mut(&agent_id) {
                            agent.push_log(message.clone());
                        }
                        drop(guard);
                        let _ = events_tx.send(Event::new(mission_id, EventKind::AgentLog { agent_id, message })).await;
                    }
                    SlotEvent::Completed { agent_id, task_id, .. } => {
                        let mut guard = inner.lock().await;
                        if let Some(agent) = guard.agents.get_mut(&agent_id) {
                            let previous = agent.status;
                            if agent.transition_to(AgentStatus::Complete).is_ok() {
                                drop(guard);
                                let _ = events_tx
                                    .send(Event::new(
                                        mission_id,
                                        EventKind::AgentStatusChanged { agent_id, previous_status: previous, new_status: AgentStatus::Complete },
                                    ))
                                    .await;
                                let _ = events_tx.send(Event::new(mission_id, EventKind::AgentTaskCompleted { agent_id, task_id })).await;
                                let _ = events_tx.send(Event::new(mission_id, EventKind::TaskCompleted { task_id, agent_id })).await;
                            } else {
                                warn!(target: "aegis::swarm", %agent_id, "discarded duplicate terminal event (first terminal wins)");
                            }
                        }
                    }
                    SlotEvent::Failed { agent_id, task_id, reason, .. } => {
                        let mut guard = inner.lock().await;
                        if let Some(agent) = guard.agents.get_mut(&agent_id) {
                            let previous = agent.status;
                            if agent.transition_to(AgentStatus::Error).is_ok() {
                                drop(guard);
                                let _ = events_tx
                                    .send(Event::new(
                                        mission_id,
                                        EventKind::AgentStatusChanged { agent_id, previous_status: previous, new_status: AgentStatus::Error },
                                    ))
                                    .await;
                                let _ = events_tx
                                    .send(Event::new(mission_id, EventKind::AgentTaskFailed { agent_id, task_id, reason: reason.clone() }))
                                    .await;
                                let _ = events_tx.send(Event::new(mission_id, EventKind::TaskFailed { task_id, agent_id, reason })).await;
                            } else {
                                warn!(target: "aegis::swarm", %agent_id, "discarded duplicate terminal event (first terminal wins)");
                            }
                        }
                    }
                    SlotEvent::Terminated { agent_id } => {
                        let mut guard = inner.lock().await;
                        if let Some(agent) = guard.agents.get_mut(&agent_id) {
                            let _ = agent.transition_to(AgentStatus::Terminated);
                        }
                        drop(guard);
                        let _ = events_tx.send(Event::new(mission_id, EventKind::AgentTerminated { agent_id })).await;
                    }
                }
            }
        })
    }

    pub async fn get_agent(&self, agent_id: Uuid) -> Option<Agent> {
        self.inner.lock().await.agents.get(&agent_id).cloned()
    }

    pub async fn list_agents(&self, mission_id: Option<Uuid>) -> Vec<Agent> {
        let guard = self.inner.lock().await;
        guard
            .agents
            .values()
            .filter(|a| mission_id.map_or(true, |m| a.mission_id == m))
            .cloned()
            .collect()
    }

    pub async fn count_active(&self) -> usize {
        let guard = self.inner.lock().await;
        guard.agents.values().filter(|a| a.status.is_active()).count()
    }

    pub async fn count_available_slots(&self) -> usize {
        let mut count = 0;
        for slot in self.slots.iter() {
            if slot.is_available().await {
                count += 1;
            }
        }
        count
    }

    pub async fn snapshot(&self) -> Vec<SlotView> {
        let guard = self.inner.lock().await;
        let mut views = Vec::with_capacity(self.slots.len());
        for slot in self.slots.iter() {
            let status = slot.status().await;
            let agent_id = slot.current_agent().await;
            let agent = agent_id.and_then(|id| guard.agents.get(&id));
            let metrics = slot.metrics().await;
            views.push(SlotView {
                index: slot.index().await,
                status,
                agent_id,
                task_id: agent.map(|a| a.current_task),
                task_title: agent.map(|a| a.current_task_title.clone()),
                progress: agent.map(|a| a.progress).unwrap_or(0),
                started_at: agent.map(|a| a.created_at),
                tasks_completed: metrics.tasks_completed,
                tasks_failed: metrics.tasks_failed,
                avg_execution_ms: metrics.avg_execution_ms(),
            });
        }
        views
    }

    /// Finds the slot owning `agent_id` and terminates it, transitioning the
    /// agent to Terminated.
    pub async fn terminate_agent(&self, agent_id: Uuid) {
        for slot in self.slots.iter() {
            if slot.current_agent().await == Some(agent_id) {
                let (tx, mut rx) = mpsc::channel(16);
                slot.terminate(tx).await;
                while rx.recv().await.is_some() {}
                return;
            }
        }
    }

    /// Terminates every active agent, awaiting each before returning
    /// (spec.md §4.4 cancellation: "terminate every agent ... fan out,
    /// await each").
    pub async fn terminate_all(&self) {
        let active: Vec<Uuid> = {
            let guard = self.inner.lock().await;
            guard.agents.values().filter(|a| a.status.is_active()).map(|a| a.id).collect()
        };
        for agent_id in active {
            self.terminate_agent(agent_id).await;
        }
    }

    /// Terminates every active agent belonging to `mission_id` (mission
    /// cancellation, spec.md §4.4).
    pub async fn terminate_all_for(&self, mission_id: Uuid) {
        let active: Vec<Uuid> = {
            let guard = self.inner.lock().await;
            guard.agents.values().filter(|a| a.status.is_active() && a.mission_id == mission_id).map(|a| a.id).collect()
        };
        for agent_id in active {
            self.terminate_agent(agent_id).await;
        }
    }

    /// Periodic health sweep (spec.md §4.3): calls `checkHealth` on every
    /// slot, logging Unhealthy ones. Does not force termination — the
    /// Mission Orchestrator decides based on the task's own timeout.
    pub async fn health_sweep(&self) {
        for slot in self.slots.iter() {
            if slot.status().await == SlotStatus::Busy {
                let healthy = slot.check_health().await;
                if !healthy {
                    info!(target: "aegis::swarm", slot_index = slot.index().await, "slot reported unhealthy during sweep");
                    slot.mark_unhealthy().await;
                }
            }
        }
    }
}
