//! Deterministic brief-to-DAG decomposition (spec.md §4.4).
//!
//! From a brief's user tasks `U = {u_1..u_k}` produces: one Scaffold, one
//! Implement per `u_i`, an optional Test, a Review, and a Document task,
//! wired together per the fixed dependency rules.

use std::collections::{HashMap, HashSet};

use crate::domain::models::mission::MissionBrief;
use crate::domain::models::task::{Priority, Task, TaskType};
use crate::domain::ports::errors::AegisError;

/// Validates brief shape: non-empty title, non-empty task list, individually
/// valid user tasks, no duplicate ids, and dependencies that resolve to
/// another task in the same brief.
pub fn validate_brief(brief: &MissionBrief) -> Result<(), AegisError> {
    if brief.title.trim().is_empty() {
        return Err(AegisError::InvalidBrief("missing title".into()));
    }
    if brief.tasks.is_empty() {
        return Err(AegisError::InvalidBrief("empty task list".into()));
    }

    let mut seen = HashSet::new();
    for task in &brief.tasks {
        if task.id.trim().is_empty() || task.title.trim().is_empty() {
            return Err(AegisError::InvalidBrief(format!("malformed task: {:?}", task.id)));
        }
        if !seen.insert(task.id.as_str()) {
            return Err(AegisError::InvalidBrief(format!("duplicate task id: {}", task.id)));
        }
    }
    for task in &brief.tasks {
        for dep in &task.dependencies {
            if !seen.contains(dep.as_str()) {
                return Err(AegisError::InvalidBrief(format!("task {} depends on unknown task {}", task.id, dep)));
            }
        }
    }
    Ok(())
}

/// Decomposes a validated brief into its ordered task sequence. Caller is
/// responsible for rejecting a cyclic result (build a [`super::super::super::domain::models::dag::TaskDag`]
/// over the returned tasks and check `has_cycle`).
pub fn decompose(brief: &MissionBrief) -> Vec<Task> {
    let mut tasks = Vec::new();
    let mut user_id_to_uuid: HashMap<&str, uuid::Uuid> = HashMap::new();

    let scaffold = Task::new(
        format!("Scaffold: {}", brief.title),
        "Prepare the mission workspace and baseline structure.",
        Priority::Critical,
        TaskType::Scaffold,
        HashSet::new(),
    );
    let scaffold_id = scaffold.id;
    tasks.push(scaffold);

    // Two passes: `user_id_to_uuid` must hold every user task's id before any
    // dependency is resolved, so a task naming a dependency that appears
    // later in `brief.tasks` (a forward reference) still resolves correctly.
    let mut implements: Vec<Task> = Vec::new();
    for user_task in &brief.tasks {
        let implement = Task::new(user_task.title.clone(), user_task.description.clone(), user_task.priority, TaskType::Implement, HashSet::new());
        user_id_to_uuid.insert(user_task.id.as_str(), implement.id);
        implements.push(implement);
    }

    let mut implement_ids = Vec::new();
    for (user_task, implement) in brief.tasks.iter().zip(implements.iter_mut()) {
        implement.tags = user_task.tags.clone();
        implement.dependencies = if user_task.dependencies.is_empty() {
            let mut s = HashSet::new();
            s.insert(scaffold_id);
            s
        } else {
            user_task
                .dependencies
                .iter()
                .filter_map(|dep| user_id_to_uuid.get(dep.as_str()).copied())
                .collect()
        };
        implement_ids.push(implement.id);
    }
    tasks.extend(implements);

    let review_deps: HashSet<uuid::Uuid> = if brief.test_required {
        let test = Task::new(
            format!("Test: {}", brief.title),
            "Run the mission's test suite against the implemented changes.",
            Priority::High,
            TaskType::Test,
            implement_ids.iter().copied().collect(),
        );
        let test_id = test.id;
        tasks.push(test);
        let mut s = HashSet::new();
        s.insert(test_id);
        s
    } else {
        implement_ids.iter().copied().collect()
    };

    let review = Task::new(
        format!("Review: {}", brief.title),
        "Review the implemented changes for correctness and quality.",
        Priority::Medium,
        TaskType::Review,
        review_deps,
    );
    let review_id = review.id;
    tasks.push(review);

    let mut document_deps = HashSet::new();
    document_deps.insert(review_id);
    let document = Task::new(
        format!("Document: {}", brief.title),
        "Document the changes made during this mission.",
        Priority::Low,
        TaskType::Document,
        document_deps,
    );
    tasks.push(document);

    tasks
}
