//! Mission Orchestrator (C4, spec.md §4.4): the decision layer. Accepts a
//! mission brief, decomposes it into a task DAG, drives a per-mission
//! scheduling loop, and owns completion/failure/cancellation semantics.

mod decomposition;
mod scheduler;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::application::event_bus::EventBus;
use crate::application::swarm::Swarm;
use crate::application::workspace_store::WorkspaceStore;
use crate::domain::models::dag::TaskDag;
use crate::domain::models::event::{Event, EventKind};
use crate::domain::models::mission::{Mission, MissionBrief, MissionStatus};
use crate::domain::ports::errors::AegisError;

pub use decomposition::{decompose, validate_brief};

/// Response shape for `initializeMission` (spec.md §6).
#[derive(Debug, Clone)]
pub struct MissionHandle {
    pub mission_id: Uuid,
    pub channel: String,
    pub estimated_duration_ms: i64,
    pub total_tasks: usize,
}

/// Per-task estimate used for the dry-run duration (SPEC_FULL.md §9);
/// loosely modelled on the simulated strategy's fixed phase timeline.
const PER_TASK_ESTIMATE_MS: i64 = 750;

struct RunningMission {
    cancel: CancellationToken,
    loop_handle: JoinHandle<()>,
}

struct Inner {
    missions: HashMap<Uuid, Mission>,
    running: HashMap<Uuid, RunningMission>,
}

/// Owns all Mission State and the per-mission scheduling loops. Cheap to
/// clone; shared between the control-plane handlers and the event
/// dispatcher that feeds task completion/failure back in.
#[derive(Clone)]
pub struct MissionOrchestrator {
    inner: Arc<Mutex<Inner>>,
    swarm: Swarm,
    workspace_store: WorkspaceStore,
    event_bus: EventBus,
}

impl MissionOrchestrator {
    pub fn new(swarm: Swarm, workspace_store: WorkspaceStore, event_bus: EventBus) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner { missions: HashMap::new(), running: HashMap::new() })),
            swarm,
            workspace_store,
            event_bus,
        }
    }

    /// Validates, decomposes, and (unless `dry_run`) creates the workspace
    /// and starts the scheduling loop asynchronously (spec.md §4.4).
    pub async fn initialize_mission(&self, brief: MissionBrief, dry_run: bool) -> Result<MissionHandle, AegisError> {
        validate_brief(&brief)?;
        let tasks = decompose(&brief);

        let dag = TaskDag::from_tasks(&tasks);
        if dag.has_cycle() {
            return Err(AegisError::InvalidBrief("cyclic dependency graph".into()));
        }
        let critical_path_len = dag.critical_path().map(|p| p.len()).unwrap_or(tasks.len());
        let total_tasks = tasks.len();
        let estimated_duration_ms = critical_path_len as i64 * PER_TASK_ESTIMATE_MS;

        let mut mission = Mission::new(brief);
        for task in tasks {
            mission.add_task(task);
        }
        let mission_id = mission.id;
        let channel = mission.channel.clone();

        if dry_run {
            return Ok(MissionHandle { mission_id, channel, estimated_duration_ms, total_tasks });
        }

        let workspace_root = self.workspace_store.create_workspace(mission_id).await?;
        mission.workspace_path = Some(workspace_root.to_string_lossy().to_string());
        mission.status = MissionStatus::Initializing;

        {
            let mut inner = self.inner.lock().await;
            inner.missions.insert(mission_id, mission);
        }

        self.event_bus.publish(Event::new(mission_id, EventKind::MissionInitialized { total_tasks })).await;

        let cancel = CancellationToken::new();
        let loop_handle = scheduler::spawn_scheduling_loop(self.clone(), mission_id, cancel.clone());
        {
            let mut inner = self.inner.lock().await;
            inner.running.insert(mission_id, RunningMission { cancel, loop_handle });
        }

        info!(target: "aegis::mission", %mission_id, total_tasks, "mission initialized");
        Ok(MissionHandle { mission_id, channel, estimated_duration_ms, total_tasks })
    }

    pub async fn get_mission(&self, mission_id: Uuid) -> Result<Mission, AegisError> {
        let inner = self.inner.lock().await;
        inner.missions.get(&mission_id).cloned().ok_or_else(|| AegisError::NotFound(format!("mission {mission_id}")))
    }

    pub async fn list_missions(&self) -> Vec<Mission> {
        let inner = self.inner.lock().await;
        inner.missions.values().cloned().collect()
    }

    /// Idempotent: a second cancel on an already-Cancelled mission returns
    /// `AlreadyCancelled`; cancel on any other terminal mission is
    /// `NotCancellable` (spec.md §5).
    pub async fn cancel_mission(&self, mission_id: Uuid, reason: Option<String>) -> Result<Mission, AegisError> {
        let status = {
            let inner = self.inner.lock().await;
            inner.missions.get(&mission_id).map(|m| m.status).ok_or_else(|| AegisError::NotFound(format!("mission {mission_id}")))?
        };

        if status == MissionStatus::Cancelled {
            return Err(AegisError::AlreadyCancelled(mission_id));
        }
        if status.is_terminal() {
            return Err(AegisError::NotCancellable(mission_id));
        }

        let running = {
            let mut inner = self.inner.lock().await;
            inner.running.remove(&mission_id)
        };
        if let Some(running) = running {
            running.cancel.cancel();
            let _ = running.loop_handle.await;
        }

        self.swarm.terminate_all_for(mission_id).await;

        let mission = {
            let mut inner = self.inner.lock().await;
            let mission = inner.missions.get_mut(&mission_id).expect("mission present after status check");
            mission.status = MissionStatus::Cancelled;
            mission.end_time = Some(chrono::Utc::now());
            mission.failure_reason = reason.clone();
            mission.clone()
        };

        self.event_bus.publish(Event::new(mission_id, EventKind::MissionCancelled { reason })).await;
        Ok(mission)
    }

    pub(crate) async fn with_mission_mut<R>(&self, mission_id: Uuid, f: impl FnOnce(&mut Mission) -> R) -> Option<R> {
        let mut inner = self.inner.lock().await;
        inner.missions.get_mut(&mission_id).map(f)
    }

    pub(crate) fn swarm(&self) -> &Swarm {
        &self.swarm
    }

    pub(crate) fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Feeds one event from the Swarm's fan-in stream back into mission
    /// state: task completion/failure handling (spec.md §4.4). Called by
    /// the central event dispatcher alongside `event_bus.publish`.
    pub async fn handle_swarm_event(&self, event: &Event) {
        scheduler::handle_swarm_event(self, event).await;
    }

    pub(crate) async fn finish_running(&self, mission_id: Uuid) {
        let mut inner = self.inner.lock().await;
        inner.running.remove(&mission_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::Config;
    use crate::domain::models::mission::UserTask;
    use crate::domain::models::task::Priority;
    use tempfile::tempdir;

    async fn harness() -> (MissionOrchestrator, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.workspace.root_path = dir.path().join("workspaces").to_string_lossy().to_string();
        config.workspace.temp_path = dir.path().join("tmp").to_string_lossy().to_string();

        let (events_tx, mut events_rx) = mpsc::channel(1024);
        let swarm = Swarm::new(&config, events_tx);
        let workspace_store = WorkspaceStore::new(&config.workspace).await.unwrap();
        let event_bus = EventBus::new();
        let orchestrator = MissionOrchestrator::new(swarm, workspace_store, event_bus.clone());

        let dispatch_orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                event_bus.publish(event.clone()).await;
                dispatch_orchestrator.handle_swarm_event(&event).await;
            }
        });

        (orchestrator, dir)
    }

    fn brief(test_required: bool) -> MissionBrief {
        MissionBrief {
            title: "demo mission".into(),
            tasks: vec![UserTask {
                id: "t1".into(),
                title: "build the thing".into(),
                description: "d".into(),
                priority: Priority::Medium,
                dependencies: vec![],
                tags: vec![],
            }],
            test_required,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn dry_run_creates_no_workspace_and_no_loop() {
        let (orchestrator, _dir) = harness().await;
        let handle = orchestrator.initialize_mission(brief(false), true).await.unwrap();
        assert_eq!(handle.total_tasks, 4);

        let inner = orchestrator.inner.lock().await;
        assert!(!inner.missions.contains_key(&handle.mission_id));
    }

    #[tokio::test]
    async fn cyclic_brief_is_rejected_before_workspace_creation() {
        let (orchestrator, _dir) = harness().await;
        let mut b = brief(false);
        b.tasks.push(UserTask {
            id: "t2".into(),
            title: "cycle".into(),
            description: "d".into(),
            priority: Priority::Medium,
            dependencies: vec!["t1".into()],
            tags: vec![],
        });
        b.tasks[0].dependencies = vec!["t2".into()];

        let result = orchestrator.initialize_mission(b, false).await;
        assert!(matches!(result, Err(AegisError::InvalidBrief(_))));
    }

    #[tokio::test]
    async fn trivial_mission_completes() {
        let (orchestrator, _dir) = harness().await;
        let handle = orchestrator.initialize_mission(brief(false), false).await.unwrap();

        let mut mission = orchestrator.get_mission(handle.mission_id).await.unwrap();
        for _ in 0..50 {
            if mission.status.is_terminal() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            mission = orchestrator.get_mission(handle.mission_id).await.unwrap();
        }

        assert_eq!(mission.status, MissionStatus::Completed);
        assert_eq!(mission.buckets.failed.len(), 0);
        assert_eq!(mission.buckets.completed.len(), 4);
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let (orchestrator, _dir) = harness().await;
        let handle = orchestrator.initialize_mission(brief(false), false).await.unwrap();

        let cancelled = orchestrator.cancel_mission(handle.mission_id, Some("user requested".into())).await.unwrap();
        assert_eq!(cancelled.status, MissionStatus::Cancelled);

        let second = orchestrator.cancel_mission(handle.mission_id, None).await;
        assert!(matches!(second, Err(AegisError::AlreadyCancelled(_))));
    }
}
