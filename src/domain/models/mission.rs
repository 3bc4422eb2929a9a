//! Mission domain model: the brief (input) and the live mission state the
//! Mission Orchestrator owns.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::task::{Priority, Task, TaskStatus, TaskType};

/// One user-supplied task inside a mission brief, before decomposition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTask {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// The immutable input to `initializeMission` (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionBrief {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    pub tasks: Vec<UserTask>,
    #[serde(default)]
    pub test_required: bool,
    #[serde(default)]
    pub technology: HashMap<String, String>,
    pub deadline: Option<DateTime<Utc>>,
}

impl Default for MissionBrief {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            title: String::new(),
            description: String::new(),
            priority: Priority::Medium,
            tasks: Vec::new(),
            test_required: false,
            technology: HashMap::new(),
            deadline: None,
        }
    }
}

/// Mission lifecycle status (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissionStatus {
    Pending,
    Initializing,
    InProgress,
    Testing,
    Completed,
    Failed,
    Cancelled,
}

impl MissionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// The four disjoint task buckets a mission's task set partitions into at
/// every observable moment (spec.md §3 invariant).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskBuckets {
    pub pending: HashSet<Uuid>,
    pub in_progress: HashSet<Uuid>,
    pub completed: HashSet<Uuid>,
    pub failed: HashSet<Uuid>,
}

impl TaskBuckets {
    pub fn total(&self) -> usize {
        self.pending.len() + self.in_progress.len() + self.completed.len() + self.failed.len()
    }

    /// Moves a task id between buckets, removing it from whichever bucket
    /// currently holds it. A no-op if the id is not tracked at all.
    pub fn move_to(&mut self, task_id: Uuid, status: TaskStatus) {
        self.pending.remove(&task_id);
        self.in_progress.remove(&task_id);
        self.completed.remove(&task_id);
        self.failed.remove(&task_id);
        match status {
            TaskStatus::Pending => self.pending.insert(task_id),
            TaskStatus::InProgress => self.in_progress.insert(task_id),
            TaskStatus::Completed => self.completed.insert(task_id),
            TaskStatus::Failed => self.failed.insert(task_id),
        };
    }

    pub fn insert_new(&mut self, task_id: Uuid) {
        self.pending.insert(task_id);
    }
}

/// The live mission owned by the Mission Orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mission {
    pub id: Uuid,
    pub brief: MissionBrief,
    pub status: MissionStatus,
    pub tasks: HashMap<Uuid, Task>,
    pub buckets: TaskBuckets,
    pub agent_ids: HashSet<Uuid>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub progress: u8,
    pub workspace_path: Option<String>,
    pub channel: String,
    pub failure_reason: Option<String>,
    pub current_phase: Option<String>,
}

impl Mission {
    pub fn new(brief: MissionBrief) -> Self {
        let id = brief.id;
        Self {
            id,
            brief,
            status: MissionStatus::Pending,
            tasks: HashMap::new(),
            buckets: TaskBuckets::default(),
            agent_ids: HashSet::new(),
            start_time: None,
            end_time: None,
            progress: 0,
            workspace_path: None,
            channel: format!("mission:{id}"),
            failure_reason: None,
            current_phase: None,
        }
    }

    pub fn add_task(&mut self, task: Task) {
        self.buckets.insert_new(task.id);
        self.tasks.insert(task.id, task);
    }

    /// The phase of the earliest `TaskType` (in pipeline order) that isn't
    /// yet fully Completed, or `None` once every task is Completed. Used to
    /// emit `mission:phase_changed` as the mission moves through Scaffold →
    /// Implement → Test → Review → Document.
    pub fn dominant_phase(&self) -> Option<String> {
        const ORDER: [TaskType; 5] = [TaskType::Scaffold, TaskType::Implement, TaskType::Test, TaskType::Review, TaskType::Document];
        for task_type in ORDER {
            let of_type: Vec<&Task> = self.tasks.values().filter(|t| t.task_type == task_type).collect();
            if !of_type.is_empty() && of_type.iter().any(|t| t.status != TaskStatus::Completed) {
                return Some(task_type.phase().to_string());
            }
        }
        None
    }

    /// The ready set: pending tasks whose dependencies are all Completed
    /// (spec.md §4.4 step 1).
    pub fn ready_set(&self) -> Vec<Uuid> {
        let mut ready: Vec<Uuid> = self
            .buckets
            .pending
            .iter()
            .filter(|id| self.tasks.get(id).map(|t| t.is_ready(&self.buckets.completed)).unwrap_or(false))
            .copied()
            .collect();
        ready.sort_by(|a, b| {
            let ta = &self.tasks[a];
            let tb = &self.tasks[b];
            tb.priority.cmp(&ta.priority).then_with(|| ta.created_at.cmp(&tb.created_at))
        });
        ready
    }

    pub fn recompute_progress(&mut self) -> bool {
        let total = self.buckets.total();
        let new_progress = if total == 0 { 0 } else { ((100 * self.buckets.completed.len()) / total) as u8 };
        let changed = new_progress != self.progress;
        self.progress = new_progress;
        changed
    }

    pub fn is_scheduling_done(&self) -> bool {
        self.buckets.pending.is_empty() && self.buckets.in_progress.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::task::TaskType;

    fn brief() -> MissionBrief {
        MissionBrief {
            title: "demo".into(),
            tasks: vec![UserTask {
                id: "t1".into(),
                title: "X".into(),
                description: "d".into(),
                priority: Priority::Medium,
                dependencies: vec![],
                tags: vec![],
            }],
            ..Default::default()
        }
    }

    #[test]
    fn new_mission_has_empty_buckets() {
        let m = Mission::new(brief());
        assert_eq!(m.buckets.total(), 0);
        assert_eq!(m.status, MissionStatus::Pending);
    }

    #[test]
    fn ready_set_respects_dependencies_and_priority_order() {
        let mut m = Mission::new(brief());
        let scaffold = Task::new("scaffold", "d", Priority::Critical, TaskType::Scaffold, Default::default());
        let scaffold_id = scaffold.id;
        let mut deps = HashSet::new();
        deps.insert(scaffold_id);
        let implement = Task::new("impl", "d", Priority::Medium, TaskType::Implement, deps);
        m.add_task(scaffold);
        m.add_task(implement);

        let ready = m.ready_set();
        assert_eq!(ready, vec![scaffold_id]);

        m.buckets.move_to(scaffold_id, TaskStatus::Completed);
        let ready2 = m.ready_set();
        assert_eq!(ready2.len(), 1);
    }

    #[test]
    fn progress_is_floor_percentage_of_completed() {
        let mut m = Mission::new(brief());
        for _ in 0..4 {
            m.add_task(Task::new("x", "d", Priority::Medium, TaskType::Implement, Default::default()));
        }
        let ids: Vec<Uuid> = m.tasks.keys().copied().collect();
        m.buckets.move_to(ids[0], TaskStatus::Completed);
        assert!(m.recompute_progress());
        assert_eq!(m.progress, 25);
    }

    #[test]
    fn bucket_move_keeps_partition_single_membership() {
        let mut buckets = TaskBuckets::default();
        let id = Uuid::new_v4();
        buckets.insert_new(id);
        buckets.move_to(id, TaskStatus::InProgress);
        assert!(!buckets.pending.contains(&id));
        assert!(buckets.in_progress.contains(&id));
        buckets.move_to(id, TaskStatus::Completed);
        assert!(!buckets.in_progress.contains(&id));
        assert!(buckets.completed.contains(&id));
    }

    #[test]
    fn dominant_phase_advances_as_earlier_types_complete() {
        let mut m = Mission::new(brief());
        let scaffold = Task::new("s", "d", Priority::Critical, TaskType::Scaffold, Default::default());
        let scaffold_id = scaffold.id;
        let mut deps = HashSet::new();
        deps.insert(scaffold_id);
        let implement = Task::new("i", "d", Priority::Medium, TaskType::Implement, deps);
        m.add_task(scaffold);
        m.add_task(implement);

        assert_eq!(m.dominant_phase(), Some("scaffold".to_string()));
        m.tasks.get_mut(&scaffold_id).unwrap().mark_completed();
        m.buckets.move_to(scaffold_id, TaskStatus::Completed);
        assert_eq!(m.dominant_phase(), Some("implement".to_string()));
    }
}
