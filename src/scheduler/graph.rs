//! DAG validation and topological batch construction.
//!
//! One Kahn-style decomposition does both jobs: it rejects duplicate ids,
//! dangling dependencies, and cycles, and yields the batch plan — batch *k*
//! holds every task whose dependencies all live in batches `0..k-1`.

use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::task::Task;

/// The task set cannot be scheduled. Raised before any task runs; a rejected
/// run produces no partial state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Two tasks share an id.
    #[error("duplicate task id: '{id}'")]
    DuplicateId { id: String },

    /// A dependency names a task outside this run.
    #[error("task '{id}' depends on unknown task '{dependency}'")]
    DanglingDependency { id: String, dependency: String },

    /// The dependency relation contains a cycle.
    #[error("circular dependency detected involving task '{id}'")]
    Cycle { id: String },

    /// An agent name outside the supported set was configured.
    #[error("unknown agent '{agent}' configured for task '{id}'")]
    UnknownAgent { id: String, agent: String },
}

/// Ordered batches of task ids. Ordering between batches is total; ordering
/// within a batch carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchPlan {
    pub batches: Vec<Vec<String>>,
}

impl BatchPlan {
    /// Number of batches.
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Whether the plan contains no batches.
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

/// Validate the task set and derive the batch plan.
pub fn build_batch_plan(tasks: &[Task]) -> Result<BatchPlan, ConfigError> {
    let mut known: HashSet<&str> = HashSet::with_capacity(tasks.len());
    for task in tasks {
        if !known.insert(task.id.as_str()) {
            return Err(ConfigError::DuplicateId {
                id: task.id.clone(),
            });
        }
    }
    for task in tasks {
        for dependency in &task.depends_on {
            if !known.contains(dependency.as_str()) {
                return Err(ConfigError::DanglingDependency {
                    id: task.id.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
    }

    let dependencies: HashMap<&str, &Vec<String>> = tasks
        .iter()
        .map(|task| (task.id.as_str(), &task.depends_on))
        .collect();

    let mut settled: HashSet<&str> = HashSet::with_capacity(tasks.len());
    let mut remaining: Vec<&str> = tasks.iter().map(|task| task.id.as_str()).collect();
    let mut batches = Vec::new();

    while !remaining.is_empty() {
        let (ready, blocked): (Vec<&str>, Vec<&str>) = remaining.into_iter().partition(|id| {
            dependencies[*id]
                .iter()
                .all(|dependency| settled.contains(dependency.as_str()))
        });

        if ready.is_empty() {
            // No progress with tasks left: every remaining task sits on a
            // cycle or downstream of one. Name one member deterministically.
            let mut cycle_members = blocked;
            cycle_members.sort_unstable();
            return Err(ConfigError::Cycle {
                id: cycle_members[0].to_string(),
            });
        }

        let mut batch: Vec<String> = ready.iter().map(|id| id.to_string()).collect();
        batch.sort_unstable();
        settled.extend(ready);
        batches.push(batch);
        remaining = blocked;
    }

    Ok(BatchPlan { batches })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, deps: &[&str]) -> Task {
        Task::with_dependencies(id, "prompt", deps.iter().map(|d| d.to_string()).collect())
    }

    #[test]
    fn test_empty_task_set_has_zero_batches() {
        let plan = build_batch_plan(&[]).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_single_root_task() {
        let plan = build_batch_plan(&[task("a", &[])]).unwrap();
        assert_eq!(plan.batches, vec![vec!["a"]]);
    }

    #[test]
    fn test_linear_chain() {
        let tasks = [task("a", &[]), task("b", &["a"])];
        let plan = build_batch_plan(&tasks).unwrap();
        assert_eq!(plan.batches, vec![vec!["a"], vec!["b"]]);
    }

    #[test]
    fn test_diamond_batches() {
        let tasks = [
            task("a", &[]),
            task("b", &["a"]),
            task("c", &["a"]),
            task("d", &["b", "c"]),
        ];
        let plan = build_batch_plan(&tasks).unwrap();
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.batches[0], vec!["a"]);
        assert_eq!(plan.batches[1], vec!["b", "c"]);
        assert_eq!(plan.batches[2], vec!["d"]);
    }

    #[test]
    fn test_fan_out() {
        let tasks = [
            task("a", &[]),
            task("l1", &["a"]),
            task("l2", &["a"]),
            task("l3", &["a"]),
            task("l4", &["a"]),
        ];
        let plan = build_batch_plan(&tasks).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.batches[1].len(), 4);
    }

    #[test]
    fn test_three_level_tree() {
        let tasks = [
            task("a", &[]),
            task("b", &[]),
            task("c", &["a"]),
            task("d", &["a"]),
            task("e", &["b"]),
            task("f", &["b"]),
            task("g", &["c"]),
            task("h", &["d"]),
            task("i", &["e"]),
            task("j", &["f"]),
        ];
        let plan = build_batch_plan(&tasks).unwrap();
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.batches[0].len(), 2);
        assert_eq!(plan.batches[1].len(), 4);
        assert_eq!(plan.batches[2].len(), 4);
    }

    #[test]
    fn test_batch_count_matches_depth_property() {
        // batch_count = 1 + max depth; d sits at depth 3.
        let tasks = [
            task("a", &[]),
            task("b", &["a"]),
            task("c", &["a", "b"]),
            task("d", &["c"]),
        ];
        let plan = build_batch_plan(&tasks).unwrap();
        assert_eq!(plan.len(), 4);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let tasks = [task("a", &[]), task("a", &[])];
        assert_eq!(
            build_batch_plan(&tasks).unwrap_err(),
            ConfigError::DuplicateId {
                id: "a".to_string()
            }
        );
    }

    #[test]
    fn test_dangling_dependency_rejected() {
        let tasks = [task("a", &["ghost"])];
        assert_eq!(
            build_batch_plan(&tasks).unwrap_err(),
            ConfigError::DanglingDependency {
                id: "a".to_string(),
                dependency: "ghost".to_string()
            }
        );
    }

    #[test]
    fn test_cycle_rejected_naming_a_member() {
        let tasks = [task("a", &["c"]), task("b", &["a"]), task("c", &["b"])];
        let err = build_batch_plan(&tasks).unwrap_err();
        match err {
            ConfigError::Cycle { id } => assert!(["a", "b", "c"].contains(&id.as_str())),
            other => panic!("expected cycle error, got {:?}", other),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let tasks = [task("a", &["a"])];
        assert!(matches!(
            build_batch_plan(&tasks).unwrap_err(),
            ConfigError::Cycle { .. }
        ));
    }
}
