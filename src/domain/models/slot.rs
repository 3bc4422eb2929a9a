//! Worker Slot domain model.
//!
//! A slot is one of the swarm's N concurrency units: a single-assignment
//! executor that owns an execution environment (simulated or containerised)
//! and runs exactly one task at a time.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Slot status (spec.md §3). Invariant: `Busy` always carries a
/// `current_agent`; `Available` never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Available,
    Busy,
    Unhealthy,
}

/// Running tallies maintained on every terminal event (spec.md §4.2).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SlotMetrics {
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub total_execution_ms: u64,
}

impl SlotMetrics {
    pub fn avg_execution_ms(&self) -> f64 {
        let terminal = self.tasks_completed + self.tasks_failed;
        if terminal == 0 {
            0.0
        } else {
            self.total_execution_ms as f64 / terminal as f64
        }
    }

    pub fn record_completion(&mut self, duration_ms: u64) {
        self.tasks_completed += 1;
        self.total_execution_ms += duration_ms;
    }

    pub fn record_failure(&mut self, duration_ms: u64) {
        self.tasks_failed += 1;
        self.total_execution_ms += duration_ms;
    }
}

/// One of the swarm's N concurrent execution positions.
#[derive(Debug, Clone)]
pub struct WorkerSlot {
    pub id: Uuid,
    pub index: usize,
    pub status: SlotStatus,
    pub current_agent: Option<Uuid>,
    pub metrics: SlotMetrics,
}

impl WorkerSlot {
    pub fn new(index: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            index,
            status: SlotStatus::Available,
            current_agent: None,
            metrics: SlotMetrics::default(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == SlotStatus::Available
    }

    /// Assigns an agent, moving `Available -> Busy`. Caller (the Swarm, under
    /// its slot-table mutex) must already have verified availability.
    pub fn assign(&mut self, agent_id: Uuid) {
        self.status = SlotStatus::Busy;
        self.current_agent = Some(agent_id);
    }

    /// Releases the slot back to `Available` after a terminal event or
    /// termination.
    pub fn release(&mut self) {
        self.status = SlotStatus::Available;
        self.current_agent = None;
    }

    pub fn mark_unhealthy(&mut self) {
        if self.status == SlotStatus::Busy {
            self.status = SlotStatus::Unhealthy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_slot_is_available_with_no_agent() {
        let s = WorkerSlot::new(3);
        assert!(s.is_available());
        assert_eq!(s.current_agent, None);
    }

    #[test]
    fn assign_then_release_round_trips_to_available() {
        let mut s = WorkerSlot::new(0);
        let agent = Uuid::new_v4();
        s.assign(agent);
        assert_eq!(s.status, SlotStatus::Busy);
        assert_eq!(s.current_agent, Some(agent));

        s.release();
        assert!(s.is_available());
        assert_eq!(s.current_agent, None);
    }

    #[test]
    fn metrics_average_is_mean_over_terminal_events() {
        let mut m = SlotMetrics::default();
        m.record_completion(100);
        m.record_failure(300);
        assert_eq!(m.tasks_completed, 1);
        assert_eq!(m.tasks_failed, 1);
        assert_eq!(m.avg_execution_ms(), 200.0);
    }
}
