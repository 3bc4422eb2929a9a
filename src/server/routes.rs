//! Control-plane routes (spec.md §6) and the SSE push channel.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use futures::{stream, Stream};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::domain::models::agent::Agent;
use crate::domain::models::mission::{Mission, MissionBrief, MissionStatus};
use crate::domain::models::slot::SlotStatus;
use crate::server::error::ApiError;
use crate::server::state::SharedState;

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/missions", post(submit_mission).get(list_missions))
        .route("/missions/{id}", get(get_mission))
        .route("/missions/{id}/cancel", post(cancel_mission))
        .route("/missions/{id}/events", get(stream_mission_events))
        .route("/swarm", get(get_swarm))
        .route("/events", get(stream_global_events))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    healthy: bool,
    version: &'static str,
    uptime_sec: u64,
    active_workers: usize,
    total_workers: usize,
    active_missions: usize,
}

async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let total_workers = state.swarm.total_slots();
    let available = state.swarm.count_available_slots().await;
    let active_missions = state
        .mission_orchestrator
        .list_missions()
        .await
        .iter()
        .filter(|m| !m.status.is_terminal())
        .count();

    Json(HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        uptime_sec: state.started_at.elapsed().as_secs(),
        active_workers: total_workers - available,
        total_workers,
        active_missions,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitMissionRequest {
    brief: MissionBrief,
    #[serde(default)]
    dry_run: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitMissionResponse {
    mission_id: Uuid,
    channel: String,
    estimated_duration_ms: i64,
    total_tasks: usize,
}

async fn submit_mission(
    State(state): State<SharedState>,
    Json(req): Json<SubmitMissionRequest>,
) -> Result<Json<SubmitMissionResponse>, ApiError> {
    let handle = state.mission_orchestrator.initialize_mission(req.brief, req.dry_run).await?;
    Ok(Json(SubmitMissionResponse {
        mission_id: handle.mission_id,
        channel: handle.channel,
        estimated_duration_ms: handle.estimated_duration_ms,
        total_tasks: handle.total_tasks,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MissionSummary {
    id: Uuid,
    status: MissionStatus,
    progress: u8,
    agent_count: usize,
    start_time: Option<DateTime<Utc>>,
    title: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MissionCounters {
    pending: usize,
    in_progress: usize,
    completed: usize,
    failed: usize,
}

#[derive(Debug, Serialize)]
struct ListMissionsResponse {
    missions: Vec<MissionSummary>,
    counters: MissionCounters,
}

async fn list_missions(State(state): State<SharedState>) -> Json<ListMissionsResponse> {
    let missions = state.mission_orchestrator.list_missions().await;
    let mut counters = MissionCounters { pending: 0, in_progress: 0, completed: 0, failed: 0 };
    let summaries = missions
        .iter()
        .map(|m| {
            match m.status {
                MissionStatus::Completed => counters.completed += 1,
                MissionStatus::Failed | MissionStatus::Cancelled => counters.failed += 1,
                MissionStatus::Pending | MissionStatus::Initializing => counters.pending += 1,
                MissionStatus::InProgress | MissionStatus::Testing => counters.in_progress += 1,
            }
            MissionSummary {
                id: m.id,
                status: m.status,
                progress: m.progress,
                agent_count: m.agent_ids.len(),
                start_time: m.start_time,
                title: m.brief.title.clone(),
            }
        })
        .collect();

    Json(ListMissionsResponse { missions: summaries, counters })
}

#[derive(Debug, Serialize)]
struct MissionDetailResponse {
    #[serde(flatten)]
    mission: Mission,
    agents: Vec<Agent>,
}

async fn get_mission(State(state): State<SharedState>, Path(id): Path<Uuid>) -> Result<Json<MissionDetailResponse>, ApiError> {
    let mission = state.mission_orchestrator.get_mission(id).await?;
    let agents = state.swarm.list_agents(Some(id)).await;
    Ok(Json(MissionDetailResponse { mission, agents }))
}

#[derive(Debug, Deserialize, Default)]
struct CancelMissionRequest {
    reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CancelMissionResponse {
    success: bool,
    mission: Mission,
}

async fn cancel_mission(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    body: Option<Json<CancelMissionRequest>>,
) -> Result<Json<CancelMissionResponse>, ApiError> {
    let reason = body.and_then(|Json(req)| req.reason);
    let mission = state.mission_orchestrator.cancel_mission(id, reason).await?;
    Ok(Json(CancelMissionResponse { success: true, mission }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SlotSummary {
    index: usize,
    status: SlotStatus,
    agent_id: Option<Uuid>,
    task_id: Option<Uuid>,
    task_title: Option<String>,
    progress: u8,
    started_at: Option<DateTime<Utc>>,
    tasks_completed: u64,
    tasks_failed: u64,
    avg_execution_ms: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GetSwarmResponse {
    total_slots: usize,
    available_slots: usize,
    active_agents: usize,
    slots: Vec<SlotSummary>,
}

async fn get_swarm(State(state): State<SharedState>) -> Json<GetSwarmResponse> {
    let snapshot = state.swarm.snapshot().await;
    Json(GetSwarmResponse {
        total_slots: state.swarm.total_slots(),
        available_slots: state.swarm.count_available_slots().await,
        active_agents: state.swarm.count_active().await,
        slots: snapshot
            .into_iter()
            .map(|s| SlotSummary {
                index: s.index,
                status: s.status,
                agent_id: s.agent_id,
                task_id: s.task_id,
                task_title: s.task_title,
                progress: s.progress,
                started_at: s.started_at,
                tasks_completed: s.tasks_completed,
                tasks_failed: s.tasks_failed,
                avg_execution_ms: s.avg_execution_ms,
            })
            .collect(),
    })
}

async fn stream_mission_events(
    State(state): State<SharedState>,
    Path(mission_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let (_subscriber_id, rx) = state.event_bus.subscribe(mission_id).await;
    Sse::new(receiver_into_sse_stream(rx)).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

async fn stream_global_events(State(state): State<SharedState>) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let (_subscriber_id, rx) = state.event_bus.subscribe_global().await;
    Sse::new(receiver_into_sse_stream(rx)).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

/// Turns a subscriber's channel into an SSE stream, one event per message,
/// ending when the event bus drops the sender (mission cleanup).
fn receiver_into_sse_stream(
    receiver: tokio::sync::mpsc::Receiver<crate::domain::models::event::Event>,
) -> impl Stream<Item = Result<SseEvent, Infallible>> {
    stream::unfold(receiver, |mut rx| async move {
        let event = rx.recv().await?;
        let sse_event = SseEvent::default().data(serde_json::to_string(&event).unwrap_or_default());
        Some((Ok(sse_event), rx))
    })
}
