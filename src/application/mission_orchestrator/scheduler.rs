//! The per-mission scheduling loop and the task completion/failure handling
//! it's driven by (spec.md §4.4).

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use super::MissionOrchestrator;
use crate::domain::models::event::{Event, EventKind};
use crate::domain::models::mission::MissionStatus;
use crate::domain::models::task::TaskStatus;

/// Scheduling ticks run roughly once a second while the mission is active
/// (spec.md §4.4).
const TICK_INTERVAL_MS: u64 = 1_000;

pub(super) fn spawn_scheduling_loop(orchestrator: MissionOrchestrator, mission_id: Uuid, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    orchestrator.finish_running(mission_id).await;
                    return;
                }
                () = tokio::time::sleep(std::time::Duration::from_millis(TICK_INTERVAL_MS)) => {}
            }

            let done = tick(&orchestrator, mission_id).await;
            if done {
                orchestrator.finish_running(mission_id).await;
                return;
            }
        }
    })
}

/// One scheduling tick: compute the ready set, dispatch up to the available
/// slot count, recompute progress, and check for mission completion.
/// Returns `true` once the mission has reached a terminal state.
async fn tick(orchestrator: &MissionOrchestrator, mission_id: Uuid) -> bool {
    let mission = match orchestrator.get_mission(mission_id).await {
        Ok(mission) => mission,
        Err(_) => return true,
    };
    if mission.status.is_terminal() {
        // A concurrent critical-task failure (handle_swarm_event) already
        // closed the mission out from under this tick.
        return true;
    }
    let ready = mission.ready_set();

    let available = orchestrator.swarm().count_available_slots().await;
    let take = ready.len().min(available);

    if orchestrator
        .with_mission_mut(mission_id, |mission| {
            if mission.status == MissionStatus::Initializing {
                mission.status = MissionStatus::InProgress;
                mission.start_time = Some(chrono::Utc::now());
                true
            } else {
                false
            }
        })
        .await
        == Some(true)
    {
        orchestrator.event_bus().publish(Event::new(mission_id, EventKind::MissionStarted)).await;
    }

    for &task_id in ready.iter().take(take) {
        dispatch_task(orchestrator, mission_id, task_id).await;
    }

    let phase_changed = orchestrator
        .with_mission_mut(mission_id, |mission| {
            let phase = mission.dominant_phase();
            if phase != mission.current_phase {
                mission.current_phase = phase.clone();
                phase
            } else {
                None
            }
        })
        .await
        .flatten();
    if let Some(phase) = phase_changed {
        orchestrator.event_bus().publish(Event::new(mission_id, EventKind::MissionPhaseChanged { phase })).await;
    }

    let progress_changed = orchestrator
        .with_mission_mut(mission_id, |mission| mission.recompute_progress())
        .await
        .unwrap_or(false);
    if progress_changed {
        let progress = orchestrator.get_mission(mission_id).await.map(|m| m.progress).unwrap_or(0);
        orchestrator.event_bus().publish(Event::new(mission_id, EventKind::MissionProgress { progress })).await;
    }

    let scheduling_done = orchestrator.get_mission(mission_id).await.map(|m| m.is_scheduling_done()).unwrap_or(true);
    if scheduling_done {
        finish_mission(orchestrator, mission_id).await;
        return true;
    }
    false
}

async fn dispatch_task(orchestrator: &MissionOrchestrator, mission_id: Uuid, task_id: Uuid) {
    let task = orchestrator
        .with_mission_mut(mission_id, |mission| {
            if let Some(task) = mission.tasks.get_mut(&task_id) {
                task.mark_in_progress();
                mission.buckets.move_to(task_id, TaskStatus::InProgress);
                Some(task.clone())
            } else {
                None
            }
        })
        .await
        .flatten();

    let Some(task) = task else { return };

    let workspace_path = match orchestrator.get_mission(mission_id).await {
        Ok(mission) => mission.workspace_path.clone().unwrap_or_default(),
        Err(_) => return,
    };

    match orchestrator.swarm().spawn_agent(task, mission_id, workspace_path).await {
        Ok(_agent) => {}
        Err(_no_slot) => {
            // Raced with a concurrent dispatch; revert to Pending for the next tick.
            orchestrator
                .with_mission_mut(mission_id, |mission| {
                    if let Some(task) = mission.tasks.get_mut(&task_id) {
                        task.status = TaskStatus::Pending;
                    }
                    mission.buckets.move_to(task_id, TaskStatus::Pending);
                })
                .await;
        }
    }
}

/// Reacts to `agent:task_completed` / `agent:task_failed` forwarded by the
/// Swarm: bucket transitions, retry budget, and the critical-task
/// short-circuit (spec.md §4.4).
pub(super) async fn handle_swarm_event(orchestrator: &MissionOrchestrator, event: &Event) {
    let mission_id = event.mission_id;
    match &event.kind {
        EventKind::AgentTaskCompleted { task_id, .. } => {
            orchestrator
                .with_mission_mut(mission_id, |mission| {
                    if let Some(task) = mission.tasks.get_mut(task_id) {
                        task.mark_completed();
                        mission.buckets.move_to(*task_id, TaskStatus::Completed);
                    }
                })
                .await;
        }
        EventKind::AgentTaskFailed { task_id, reason, .. } => {
            let critical_failure = orchestrator
                .with_mission_mut(mission_id, |mission| {
                    let Some(task) = mission.tasks.get_mut(task_id) else { return None };
                    task.mark_failed();
                    if task.can_retry() {
                        task.retry();
                        mission.buckets.move_to(*task_id, TaskStatus::Pending);
                        None
                    } else {
                        mission.buckets.move_to(*task_id, TaskStatus::Failed);
                        if task.priority == crate::domain::models::task::Priority::Critical {
                            Some(format!("critical task failed: {reason}"))
                        } else {
                            None
                        }
                    }
                })
                .await
                .flatten();

            if let Some(reason) = critical_failure {
                fail_mission(orchestrator, mission_id, reason).await;
            }
        }
        _ => {}
    }
}

async fn fail_mission(orchestrator: &MissionOrchestrator, mission_id: Uuid, reason: String) {
    let already_terminal = orchestrator
        .with_mission_mut(mission_id, |mission| {
            if mission.status.is_terminal() {
                true
            } else {
                mission.status = MissionStatus::Failed;
                mission.end_time = Some(chrono::Utc::now());
                mission.failure_reason = Some(reason.clone());
                false
            }
        })
        .await
        .unwrap_or(true);

    if already_terminal {
        return;
    }

    orchestrator.swarm().terminate_all_for(mission_id).await;
    orchestrator.event_bus().publish(Event::new(mission_id, EventKind::MissionFailed { reason })).await;
    orchestrator.finish_running(mission_id).await;
}

async fn finish_mission(orchestrator: &MissionOrchestrator, mission_id: Uuid) {
    let outcome = orchestrator
        .with_mission_mut(mission_id, |mission| {
            if mission.status.is_terminal() {
                return None;
            }
            let failed = !mission.buckets.failed.is_empty();
            mission.status = if failed { MissionStatus::Failed } else { MissionStatus::Completed };
            mission.end_time = Some(chrono::Utc::now());
            let duration_ms = match (mission.start_time, mission.end_time) {
                (Some(start), Some(end)) => (end - start).num_milliseconds(),
                _ => 0,
            };
            Some((failed, duration_ms, mission.workspace_path.clone().unwrap_or_default(), mission.buckets.completed.len(), mission.buckets.failed.len()))
        })
        .await
        .flatten();

    let Some((failed, duration_ms, workspace_path, completed_tasks, failed_tasks)) = outcome else { return };

    if failed {
        let reason = format!("{failed_tasks} task(s) failed");
        orchestrator.with_mission_mut(mission_id, |mission| mission.failure_reason = Some(reason.clone())).await;
        orchestrator.event_bus().publish(Event::new(mission_id, EventKind::MissionFailed { reason })).await;
        warn!(target: "aegis::mission", %mission_id, failed_tasks, "mission failed");
    } else {
        orchestrator
            .event_bus()
            .publish(Event::new(mission_id, EventKind::MissionCompleted { duration_ms, workspace_path, completed_tasks, failed_tasks }))
            .await;
    }
}
