//! Event taxonomy (spec.md §4.5).
//!
//! Events are produced, not stored: a tagged record with a type, a
//! timestamp, a mission id, and a type-specific payload. Every event group
//! (Agent, Mission, Task) maps to one variant here, each carrying its own
//! strongly-typed payload (SPEC_FULL.md design note: "dynamic per-event
//! payloads map to a tagged sum").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::agent::AgentStatus;

/// Closed set of event payloads. `#[serde(tag = "type")]` renders as
/// `{"type": "agent:spawned", ...fields}` over the wire, matching the
/// `type`-tagged shape spec.md §4.5 describes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum EventKind {
    #[serde(rename = "agent:spawned")]
    AgentSpawned { agent_id: Uuid, task_id: Uuid, slot_index: usize },
    #[serde(rename = "agent:status_changed")]
    AgentStatusChanged { agent_id: Uuid, previous_status: AgentStatus, new_status: AgentStatus },
    #[serde(rename = "agent:task_started")]
    AgentTaskStarted { agent_id: Uuid, task_id: Uuid },
    #[serde(rename = "agent:task_completed")]
    AgentTaskCompleted { agent_id: Uuid, task_id: Uuid },
    #[serde(rename = "agent:task_failed")]
    AgentTaskFailed { agent_id: Uuid, task_id: Uuid, reason: String },
    #[serde(rename = "agent:terminated")]
    AgentTerminated { agent_id: Uuid },
    #[serde(rename = "agent:log")]
    AgentLog { agent_id: Uuid, message: String },

    #[serde(rename = "mission:initialized")]
    MissionInitialized { total_tasks: usize },
    #[serde(rename = "mission:started")]
    MissionStarted,
    #[serde(rename = "mission:progress")]
    MissionProgress { progress: u8 },
    #[serde(rename = "mission:phase_changed")]
    MissionPhaseChanged { phase: String },
    #[serde(rename = "mission:completed")]
    MissionCompleted { duration_ms: i64, workspace_path: String, completed_tasks: usize, failed_tasks: usize },
    #[serde(rename = "mission:failed")]
    MissionFailed { reason: String },
    #[serde(rename = "mission:cancelled")]
    MissionCancelled { reason: Option<String> },

    #[serde(rename = "task:started")]
    TaskStarted { task_id: Uuid, agent_id: Uuid },
    #[serde(rename = "task:progress")]
    TaskProgress { task_id: Uuid, agent_id: Uuid, progress: u8 },
    #[serde(rename = "task:completed")]
    TaskCompleted { task_id: Uuid, agent_id: Uuid },
    #[serde(rename = "task:failed")]
    TaskFailed { task_id: Uuid, agent_id: Uuid, reason: String },
}

/// A published event, always attached to a mission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub mission_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    pub fn new(mission_id: Uuid, kind: EventKind) -> Self {
        Self { mission_id, timestamp: Utc::now(), kind }
    }

    /// Whether this event is one of the three terminal mission events that
    /// trigger `cleanupMission` on the Event Fan-out (spec.md §4.5).
    pub fn is_terminal_mission_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::MissionCompleted { .. } | EventKind::MissionFailed { .. } | EventKind::MissionCancelled { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_mission_events_are_recognised() {
        let m = Uuid::new_v4();
        let e = Event::new(m, EventKind::MissionCompleted {
            duration_ms: 10,
            workspace_path: "/tmp".into(),
            completed_tasks: 4,
            failed_tasks: 0,
        });
        assert!(e.is_terminal_mission_event());

        let e2 = Event::new(m, EventKind::MissionProgress { progress: 50 });
        assert!(!e2.is_terminal_mission_event());
    }

    #[test]
    fn serializes_with_type_tag() {
        let m = Uuid::new_v4();
        let e = Event::new(m, EventKind::AgentSpawned { agent_id: Uuid::new_v4(), task_id: Uuid::new_v4(), slot_index: 0 });
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["type"], "agent:spawned");
        assert_eq!(v["missionId"], serde_json::Value::String(m.to_string()));
    }
}
