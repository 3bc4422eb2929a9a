//! Agent domain model.
//!
//! An agent is the live execution context for one task assignment on one
//! slot: created by the Swarm at `spawnAgent`, destroyed at a terminal event
//! or explicit termination. An agent is bound to exactly one slot and one
//! task for its lifetime; a retry produces a new agent, possibly on a
//! different slot.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Agent lifecycle status (spec.md §3, §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Initializing,
    Coding,
    Testing,
    Complete,
    Error,
    Terminated,
}

impl AgentStatus {
    /// `Initializing -> Coding -> {Testing} -> {Complete|Error}`, any state
    /// can move to `Terminated` (spec.md §4.3).
    pub fn can_transition_to(self, next: AgentStatus) -> bool {
        if next == AgentStatus::Terminated {
            return self != AgentStatus::Terminated;
        }
        matches!(
            (self, next),
            (AgentStatus::Initializing, AgentStatus::Coding)
                | (AgentStatus::Coding, AgentStatus::Testing)
                | (AgentStatus::Coding, AgentStatus::Complete)
                | (AgentStatus::Coding, AgentStatus::Error)
                | (AgentStatus::Testing, AgentStatus::Complete)
                | (AgentStatus::Testing, AgentStatus::Error)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AgentStatus::Complete | AgentStatus::Error | AgentStatus::Terminated)
    }

    /// Whether this status counts toward `countActive` (spec.md §4.3: "not in
    /// {Idle, Terminated, Complete, Error}" — this model has no Idle agent,
    /// agents are created already Initializing).
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }
}

/// One line appended to an agent's bounded log ring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLine {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// The live execution context for one task assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub slot_index: usize,
    pub mission_id: Uuid,
    pub current_task: Uuid,
    pub current_task_title: String,
    pub status: AgentStatus,
    pub progress: u8,
    pub log: VecDeque<LogLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    /// Cap on the bounded log ring (SPEC_FULL.md §9).
    pub const MAX_LOG_LINES: usize = 200;

    pub fn new(slot_index: usize, mission_id: Uuid, current_task: Uuid, current_task_title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            slot_index,
            mission_id,
            current_task,
            current_task_title: current_task_title.into(),
            status: AgentStatus::Initializing,
            progress: 0,
            log: VecDeque::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Appends a log line, evicting the oldest entry once over
    /// [`MAX_LOG_LINES`](Self::MAX_LOG_LINES).
    pub fn push_log(&mut self, message: impl Into<String>) {
        if self.log.len() >= Self::MAX_LOG_LINES {
            self.log.pop_front();
        }
        self.log.push_back(LogLine {
            at: Utc::now(),
            message: message.into(),
        });
    }

    /// Attempts the transition, logging and discarding if invalid rather than
    /// panicking — a slot forwarding a stale or duplicate terminal event must
    /// not corrupt agent state.
    pub fn transition_to(&mut self, next: AgentStatus) -> Result<(), String> {
        if !self.status.can_transition_to(next) {
            return Err(format!("invalid agent transition {:?} -> {:?}", self.status, next));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn set_progress(&mut self, progress: u8) {
        self.progress = progress.min(100);
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_agent_starts_initializing() {
        let a = Agent::new(0, Uuid::new_v4(), Uuid::new_v4(), "t");
        assert_eq!(a.status, AgentStatus::Initializing);
        assert!(a.status.is_active());
    }

    #[test]
    fn valid_lifecycle_transitions_succeed() {
        let mut a = Agent::new(0, Uuid::new_v4(), Uuid::new_v4(), "t");
        assert!(a.transition_to(AgentStatus::Coding).is_ok());
        assert!(a.transition_to(AgentStatus::Complete).is_ok());
        assert!(a.status.is_terminal());
    }

    #[test]
    fn terminated_reachable_from_any_non_terminated_state() {
        let mut a = Agent::new(0, Uuid::new_v4(), Uuid::new_v4(), "t");
        assert!(a.transition_to(AgentStatus::Terminated).is_ok());
        assert!(a.transition_to(AgentStatus::Terminated).is_err());
    }

    #[test]
    fn double_terminal_transition_is_rejected() {
        let mut a = Agent::new(0, Uuid::new_v4(), Uuid::new_v4(), "t");
        a.transition_to(AgentStatus::Coding).unwrap();
        a.transition_to(AgentStatus::Complete).unwrap();
        assert!(a.transition_to(AgentStatus::Error).is_err());
    }

    #[test]
    fn log_ring_evicts_oldest_past_cap() {
        let mut a = Agent::new(0, Uuid::new_v4(), Uuid::new_v4(), "t");
        for i in 0..(Agent::MAX_LOG_LINES + 10) {
            a.push_log(format!("line {i}"));
        }
        assert_eq!(a.log.len(), Agent::MAX_LOG_LINES);
        assert_eq!(a.log.front().unwrap().message, "line 10");
    }

    #[test]
    fn progress_clamps_to_100() {
        let mut a = Agent::new(0, Uuid::new_v4(), Uuid::new_v4(), "t");
        a.set_progress(250);
        assert_eq!(a.progress, 100);
    }
}
