//! Aegis Orchestrator - headless mission orchestration service
//!
//! - DAG-based mission decomposition into dependency-ordered tasks
//! - A bounded worker-slot swarm with simulated and containerised execution
//! - An isolated per-mission workspace store with TTL-based cleanup
//! - An HTTP + SSE control plane for submitting and observing missions

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod server;

pub use application::{EventBus, MissionHandle, MissionOrchestrator, Swarm, WorkspaceStore};
pub use domain::models::config::Config;
