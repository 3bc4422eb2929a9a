//! Shared application state injected into every axum handler.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::application::{EventBus, MissionOrchestrator, Swarm, WorkspaceStore};
use crate::domain::models::config::Config;
use crate::domain::models::event::Event;
use crate::domain::ports::errors::AegisError;

/// Everything a control-plane handler needs, plus the background tasks
/// wired together once at startup (event dispatch, health sweep, workspace
/// TTL sweep).
#[derive(Clone)]
pub struct AppState {
    pub swarm: Swarm,
    pub workspace_store: WorkspaceStore,
    pub event_bus: EventBus,
    pub mission_orchestrator: MissionOrchestrator,
    pub started_at: Instant,
}

impl AppState {
    /// Builds the component graph and spawns the three always-on background
    /// loops: the slot-event dispatcher (fans every `Event` into the bus and
    /// the mission orchestrator's completion handling), the swarm health
    /// sweep, and the workspace TTL sweep (spec.md §5, §4.1, §4.3).
    pub async fn bootstrap(config: &Config) -> Result<Self, AegisError> {
        let (events_tx, mut events_rx) = mpsc::channel::<Event>(4096);

        let swarm = Swarm::new(config, events_tx);
        let workspace_store = WorkspaceStore::new(&config.workspace).await?;
        let event_bus = EventBus::new();
        let mission_orchestrator = MissionOrchestrator::new(swarm.clone(), workspace_store.clone(), event_bus.clone());

        let dispatch_bus = event_bus.clone();
        let dispatch_orchestrator = mission_orchestrator.clone();
        tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                dispatch_bus.publish(event.clone()).await;
                dispatch_orchestrator.handle_swarm_event(&event).await;
            }
        });

        let health_swarm = swarm.clone();
        let health_interval = config.swarm.health_check_interval_ms;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_millis(health_interval));
            loop {
                ticker.tick().await;
                health_swarm.health_sweep().await;
            }
        });

        let sweep_store = workspace_store.clone();
        let sweep_interval = config.workspace.sweep_interval_ms;
        let ttl_ms = config.workspace.ttl_ms;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_millis(sweep_interval));
            loop {
                ticker.tick().await;
                sweep_store.sweep(ttl_ms).await;
            }
        });

        Ok(Self { swarm, workspace_store, event_bus, mission_orchestrator, started_at: Instant::now() })
    }
}

pub type SharedState = Arc<AppState>;
