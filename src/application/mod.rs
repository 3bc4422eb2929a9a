pub mod event_bus;
pub mod execution;
pub mod mission_orchestrator;
pub mod swarm;
pub mod worker_slot;
pub mod workspace_store;

pub use event_bus::EventBus;
pub use mission_orchestrator::{MissionHandle, MissionOrchestrator};
pub use swarm::Swarm;
pub use workspace_store::WorkspaceStore;
