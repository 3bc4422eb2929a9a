//! Task dependency DAG: cycle detection, topological order, and
//! critical-path length (used for the dry-run duration estimate).

use std::collections::{HashMap, HashSet, VecDeque};

use uuid::Uuid;

use super::task::{Task, TaskStatus};

/// One node of the dependency graph, shadowing the subset of `Task` the DAG
/// algorithms need so they don't borrow the mission's task table directly.
#[derive(Debug, Clone)]
pub struct DagNode {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub dependencies: Vec<Uuid>,
    pub dependents: Vec<Uuid>,
}

impl DagNode {
    pub fn from_task(task: &Task) -> Self {
        Self {
            task_id: task.id,
            status: task.status,
            dependencies: task.dependencies.iter().copied().collect(),
            dependents: Vec::new(),
        }
    }
}

/// A mission's task dependency graph.
#[derive(Debug, Clone)]
pub struct TaskDag {
    pub nodes: HashMap<Uuid, DagNode>,
}

impl TaskDag {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let mut nodes: HashMap<Uuid, DagNode> = HashMap::new();

        for task in tasks {
            nodes.insert(task.id, DagNode::from_task(task));
        }

        for task in tasks {
            for dep_id in &task.dependencies {
                if let Some(dep_node) = nodes.get_mut(dep_id) {
                    dep_node.dependents.push(task.id);
                }
            }
        }

        Self { nodes }
    }

    /// Whether the dependency graph has a cycle (spec.md §4.4 validation: the
    /// Mission Orchestrator rejects cyclic briefs before building a mission).
    pub fn has_cycle(&self) -> bool {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();

        for &node_id in self.nodes.keys() {
            if self.detect_cycle_dfs(node_id, &mut visited, &mut rec_stack) {
                return true;
            }
        }
        false
    }

    fn detect_cycle_dfs(&self, node_id: Uuid, visited: &mut HashSet<Uuid>, rec_stack: &mut HashSet<Uuid>) -> bool {
        if rec_stack.contains(&node_id) {
            return true;
        }
        if visited.contains(&node_id) {
            return false;
        }

        visited.insert(node_id);
        rec_stack.insert(node_id);

        if let Some(node) = self.nodes.get(&node_id) {
            for &dependent in &node.dependents {
                if self.detect_cycle_dfs(dependent, visited, rec_stack) {
                    return true;
                }
            }
        }

        rec_stack.remove(&node_id);
        false
    }

    pub fn topological_sort(&self) -> Result<Vec<Uuid>, DagError> {
        if self.has_cycle() {
            return Err(DagError::CycleDetected);
        }

        let mut result = Vec::new();
        let mut in_degree: HashMap<Uuid, usize> = HashMap::new();
        let mut queue = VecDeque::new();

        for (id, node) in &self.nodes {
            let deps_in_dag = node.dependencies.iter().filter(|d| self.nodes.contains_key(d)).count();
            in_degree.insert(*id, deps_in_dag);
        }

        for (&id, &degree) in &in_degree {
            if degree == 0 {
                queue.push_back(id);
            }
        }

        while let Some(node_id) = queue.pop_front() {
            result.push(node_id);

            if let Some(node) = self.nodes.get(&node_id) {
                for &dependent in &node.dependents {
                    if let Some(degree) = in_degree.get_mut(&dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(dependent);
                        }
                    }
                }
            }
        }

        if result.len() != self.nodes.len() {
            return Err(DagError::CycleDetected);
        }

        Ok(result)
    }

    /// Longest dependency chain, in node count. Used for the dry-run
    /// `estimatedDurationMs` (SPEC_FULL.md §9): `critical_path().len() *
    /// PER_TASK_ESTIMATE_MS`.
    pub fn critical_path(&self) -> Result<Vec<Uuid>, DagError> {
        let sorted = self.topological_sort()?;
        let mut distances: HashMap<Uuid, usize> = HashMap::new();
        let mut predecessors: HashMap<Uuid, Option<Uuid>> = HashMap::new();

        for &id in &sorted {
            distances.insert(id, 0);
            predecessors.insert(id, None);
        }

        for &node_id in &sorted {
            if let Some(node) = self.nodes.get(&node_id) {
                let current_dist = *distances.get(&node_id).unwrap_or(&0);
                for &dependent in &node.dependents {
                    let new_dist = current_dist + 1;
                    if new_dist > *distances.get(&dependent).unwrap_or(&0) {
                        distances.insert(dependent, new_dist);
                        predecessors.insert(dependent, Some(node_id));
                    }
                }
            }
        }

        let end_node = distances.iter().max_by_key(|&(_, &dist)| dist).map(|(&id, _)| id);

        if let Some(mut current) = end_node {
            let mut path = vec![current];
            while let Some(&Some(pred)) = predecessors.get(&current) {
                path.push(pred);
                current = pred;
            }
            path.reverse();
            Ok(path)
        } else {
            Ok(vec![])
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DagError {
    #[error("cyclic dependency graph")]
    CycleDetected,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::task::{Priority, TaskType};

    fn make_task(id: Uuid, title: &str, deps: Vec<Uuid>) -> Task {
        let mut task = Task::new(title, "d", Priority::Medium, TaskType::Implement, deps.into_iter().collect());
        task.id = id;
        task
    }

    #[test]
    fn simple_chain_has_no_cycle() {
        let (id1, id2, id3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let tasks = vec![
            make_task(id1, "a", vec![]),
            make_task(id2, "b", vec![id1]),
            make_task(id3, "c", vec![id2]),
        ];
        let dag = TaskDag::from_tasks(&tasks);

        assert_eq!(dag.nodes.len(), 3);
        assert!(!dag.has_cycle());
    }

    #[test]
    fn topological_sort_orders_dependencies_first() {
        let (id1, id2, id3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let tasks = vec![
            make_task(id1, "a", vec![]),
            make_task(id2, "b", vec![id1]),
            make_task(id3, "c", vec![id1]),
        ];
        let dag = TaskDag::from_tasks(&tasks);
        let sorted = dag.topological_sort().unwrap();

        let pos1 = sorted.iter().position(|&x| x == id1).unwrap();
        let pos2 = sorted.iter().position(|&x| x == id2).unwrap();
        let pos3 = sorted.iter().position(|&x| x == id3).unwrap();
        assert!(pos1 < pos2);
        assert!(pos1 < pos3);
    }

    #[test]
    fn cycle_is_detected_and_rejected() {
        let (id1, id2, id3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let tasks = vec![
            make_task(id1, "a", vec![id3]),
            make_task(id2, "b", vec![id1]),
            make_task(id3, "c", vec![id2]),
        ];
        let dag = TaskDag::from_tasks(&tasks);

        assert!(dag.has_cycle());
        assert!(matches!(dag.topological_sort(), Err(DagError::CycleDetected)));
    }

    #[test]
    fn critical_path_picks_the_longest_chain() {
        let (id1, id2, id3, id4, id5) =
            (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let tasks = vec![
            make_task(id1, "a", vec![]),
            make_task(id2, "b", vec![id1]),
            make_task(id3, "c", vec![]),
            make_task(id4, "d", vec![id2, id3]),
            make_task(id5, "e", vec![id4]),
        ];
        let dag = TaskDag::from_tasks(&tasks);
        assert_eq!(dag.critical_path().unwrap().len(), 4);
    }
}
