//! Task description for DAG execution.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Recognized task categories.
///
/// The category feeds complexity scoring (`database` tasks score higher) and
/// marks the synthetic aggregation task appended by the MetaAgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    /// Shell / filesystem work.
    Os,
    /// Database queries and transactions.
    Database,
    /// Result aggregation (MetaAgent-generated).
    Summary,
    /// Anything else.
    #[default]
    Unknown,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskType::Os => write!(f, "os"),
            TaskType::Database => write!(f, "database"),
            TaskType::Summary => write!(f, "summary"),
            TaskType::Unknown => write!(f, "unknown"),
        }
    }
}

/// One unit of work in the DAG.
///
/// Tasks are created by the caller before a run begins and are immutable once
/// execution starts, with one exception: the MetaAgent may rewrite `prompt`
/// (exactly once, before the first batch) when prompt generation is enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier within the DAG.
    pub id: String,
    /// Natural-language instruction delivered to the agent.
    pub prompt: String,
    /// Ids of tasks that must settle before this one may start.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Task category.
    #[serde(rename = "type", default)]
    pub task_type: TaskType,
    /// Opaque notes: description, output schema hints, complexity score.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Task {
    /// Create a root task with no dependencies.
    pub fn new(id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            depends_on: Vec::new(),
            task_type: TaskType::default(),
            metadata: HashMap::new(),
        }
    }

    /// Create a task that depends on the given upstream ids.
    pub fn with_dependencies(
        id: impl Into<String>,
        prompt: impl Into<String>,
        depends_on: Vec<String>,
    ) -> Self {
        Self {
            depends_on,
            ..Self::new(id, prompt)
        }
    }

    /// Set the task category.
    pub fn with_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    /// Whether this task has no upstream dependencies.
    pub fn is_root(&self) -> bool {
        self.depends_on.is_empty()
    }

    /// Read a metadata flag, treating anything but `true` as unset.
    pub fn metadata_flag(&self, key: &str) -> bool {
        matches!(
            self.metadata.get(key),
            Some(serde_json::Value::Bool(true))
        )
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Task(id={}, type={}, depends_on=[{}])",
            self.id,
            self.task_type,
            self.depends_on.join(", ")
        )
    }
}
