//! End-to-end mission lifecycle tests driven entirely through
//! `MissionOrchestrator`'s public API, with a real (in-process) Swarm,
//! WorkspaceStore, and EventBus wired the same way `AppState::bootstrap`
//! wires them.

use std::sync::Arc;

use aegis_orchestrator::application::execution::SimulatedStrategy;
use aegis_orchestrator::application::swarm::Swarm;
use aegis_orchestrator::domain::models::config::Config;
use aegis_orchestrator::domain::models::mission::{MissionBrief, MissionStatus, UserTask};
use aegis_orchestrator::domain::models::task::Priority;
use aegis_orchestrator::domain::ports::errors::AegisError;
use aegis_orchestrator::domain::ports::execution::ExecutionStrategy;
use aegis_orchestrator::{EventBus, MissionOrchestrator, WorkspaceStore};
use tokio::sync::mpsc;

fn user_task(id: &str, title: &str, deps: Vec<&str>) -> UserTask {
    UserTask {
        id: id.into(),
        title: title.into(),
        description: "d".into(),
        priority: Priority::Medium,
        dependencies: deps.into_iter().map(String::from).collect(),
        tags: vec![],
    }
}

fn workspace_config(dir: &tempfile::TempDir) -> aegis_orchestrator::domain::models::config::WorkspaceConfig {
    let mut config = Config::default().workspace;
    config.root_path = dir.path().join("workspaces").to_string_lossy().to_string();
    config.temp_path = dir.path().join("tmp").to_string_lossy().to_string();
    config
}

/// Builds an orchestrator with a plain, never-failing simulated strategy on
/// every slot and spawns the same central event dispatcher `AppState::bootstrap`
/// wires in production: every event is fanned into both the event bus and the
/// orchestrator's own swarm-event handler. Returns a standalone `Swarm` handle
/// too (cheap clone of the same pool) since `MissionOrchestrator` doesn't
/// expose its swarm publicly.
async fn harness(max_workers: usize) -> (MissionOrchestrator, Swarm, tempfile::TempDir) {
    harness_with_strategies((0..max_workers).map(|_| Arc::new(SimulatedStrategy::new()) as Arc<dyn ExecutionStrategy>).collect()).await
}

async fn harness_with_strategies(strategies: Vec<Arc<dyn ExecutionStrategy>>) -> (MissionOrchestrator, Swarm, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let workspace_store = WorkspaceStore::new(&workspace_config(&dir)).await.unwrap();

    let (events_tx, mut events_rx) = mpsc::channel(1024);
    let swarm = Swarm::with_strategies(strategies, 60_000, events_tx);
    let swarm_handle = swarm.clone();
    let event_bus = EventBus::new();
    let orchestrator = MissionOrchestrator::new(swarm, workspace_store, event_bus.clone());

    let dispatch_orchestrator = orchestrator.clone();
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            event_bus.publish(event.clone()).await;
            dispatch_orchestrator.handle_swarm_event(&event).await;
        }
    });

    (orchestrator, swarm_handle, dir)
}

async fn wait_for_terminal(orchestrator: &MissionOrchestrator, mission_id: uuid::Uuid) -> MissionStatus {
    let mut mission = orchestrator.get_mission(mission_id).await.unwrap();
    for _ in 0..100 {
        if mission.status.is_terminal() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        mission = orchestrator.get_mission(mission_id).await.unwrap();
    }
    mission.status
}

#[tokio::test]
async fn diamond_dependency_mission_completes_in_order() {
    let (orchestrator, _swarm, _dir) = harness(4).await;
    let brief = MissionBrief {
        title: "diamond".into(),
        tasks: vec![
            user_task("a", "a", vec![]),
            user_task("b", "b", vec!["a"]),
            user_task("c", "c", vec!["a"]),
            user_task("d", "d", vec!["b", "c"]),
        ],
        ..Default::default()
    };

    let handle = orchestrator.initialize_mission(brief, false).await.unwrap();
    let status = wait_for_terminal(&orchestrator, handle.mission_id).await;

    assert_eq!(status, MissionStatus::Completed);
    let mission = orchestrator.get_mission(handle.mission_id).await.unwrap();
    // Scaffold + 4 user tasks + Review + Document, no Test task (testRequired defaults false).
    assert_eq!(mission.buckets.completed.len(), 7);
    assert_eq!(mission.buckets.failed.len(), 0);
}

#[tokio::test]
async fn critical_task_failure_short_circuits_the_mission() {
    // Scaffold is always Priority::Critical with maxRetries=1; scripting it
    // as a permanent failure exhausts that budget on the first attempt.
    let scaffold_title = "Scaffold: critical failure";
    let strategies: Vec<Arc<dyn ExecutionStrategy>> = vec![Arc::new(SimulatedStrategy::new().with_permanent_failures(vec![scaffold_title.to_string()]))];
    let (orchestrator, _swarm, _dir) = harness_with_strategies(strategies).await;

    let brief = MissionBrief {
        title: "critical failure".into(),
        tasks: vec![user_task("t1", "t1", vec![])],
        ..Default::default()
    };

    let handle = orchestrator.initialize_mission(brief, false).await.unwrap();
    let status = wait_for_terminal(&orchestrator, handle.mission_id).await;

    assert_eq!(status, MissionStatus::Failed);
    let mission = orchestrator.get_mission(handle.mission_id).await.unwrap();
    assert!(mission.failure_reason.as_deref().unwrap_or_default().contains("critical task failed"));
    // The downstream implement/review/document tasks never got dispatched.
    assert_eq!(mission.buckets.completed.len(), 0);
}

#[tokio::test]
async fn transient_task_failure_recovers_via_retry() {
    // A non-critical Implement task (maxRetries=3) fails once, then succeeds.
    let strategies: Vec<Arc<dyn ExecutionStrategy>> = vec![Arc::new(SimulatedStrategy::new().with_scripted_failures(vec!["flaky".to_string()]))];
    let (orchestrator, _swarm, _dir) = harness_with_strategies(strategies).await;

    let brief = MissionBrief {
        title: "transient failure".into(),
        tasks: vec![user_task("t1", "flaky", vec![])],
        ..Default::default()
    };

    let handle = orchestrator.initialize_mission(brief, false).await.unwrap();
    let status = wait_for_terminal(&orchestrator, handle.mission_id).await;

    assert_eq!(status, MissionStatus::Completed);
    let mission = orchestrator.get_mission(handle.mission_id).await.unwrap();
    let flaky = mission.tasks.values().find(|t| t.title == "flaky").unwrap();
    assert_eq!(flaky.retry_count, 1);
}

#[tokio::test]
async fn cancellation_mid_flight_terminates_agents_but_keeps_the_workspace() {
    let (orchestrator, swarm, _dir) = harness(1).await;
    let brief = MissionBrief {
        title: "cancel mid flight".into(),
        tasks: vec![user_task("t1", "t1", vec![])],
        ..Default::default()
    };

    let handle = orchestrator.initialize_mission(brief, false).await.unwrap();

    // Give the scheduling loop's first tick (fires after ~1s) time to
    // dispatch the scaffold task and the simulated strategy time to start
    // stepping through progress, so cancellation actually interrupts a
    // running agent rather than a still-pending one.
    tokio::time::sleep(std::time::Duration::from_millis(1300)).await;
    assert_eq!(swarm.count_active().await, 1);

    let workspace_path = orchestrator.get_mission(handle.mission_id).await.unwrap().workspace_path.unwrap();
    assert!(std::path::Path::new(&workspace_path).exists());

    let cancelled = orchestrator.cancel_mission(handle.mission_id, Some("operator requested".into())).await.unwrap();
    assert_eq!(cancelled.status, MissionStatus::Cancelled);
    assert_eq!(swarm.count_active().await, 0);

    // Workspace deletion is deferred to the TTL sweep, not done on cancel.
    assert!(std::path::Path::new(&workspace_path).exists());

    let second = orchestrator.cancel_mission(handle.mission_id, None).await;
    assert!(matches!(second, Err(AegisError::AlreadyCancelled(_))));
}

#[tokio::test]
async fn no_available_slot_requeues_the_task_for_the_next_tick() {
    // A single-slot swarm with two independent ready tasks: the second must
    // be requeued to Pending rather than lost.
    let (orchestrator, _swarm, _dir) = harness(1).await;
    let brief = MissionBrief {
        title: "saturated".into(),
        tasks: vec![user_task("a", "a", vec![]), user_task("b", "b", vec![])],
        ..Default::default()
    };

    let handle = orchestrator.initialize_mission(brief, false).await.unwrap();
    let status = wait_for_terminal(&orchestrator, handle.mission_id).await;

    assert_eq!(status, MissionStatus::Completed);
    let mission = orchestrator.get_mission(handle.mission_id).await.unwrap();
    assert_eq!(mission.buckets.failed.len(), 0);
}
