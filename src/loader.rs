//! Task-group document model.
//!
//! The scheduler consumes a structured document describing task groups, each
//! a list of tasks plus optional per-task input mappings. This module defines
//! that document and converts it into the scheduler's input types; where the
//! document comes from (disk, network, inline) is the caller's concern.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::injection::{InputMapping, InputMappings};
use crate::task::{Task, TaskType};

/// Failure to read or parse a task-group document.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The document could not be read.
    #[error("failed to read task document: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not valid JSON of the expected shape.
    #[error("invalid task document: {0}")]
    Parse(#[from] serde_json::Error),

    /// No group with the requested id.
    #[error("unknown task group: '{0}'")]
    UnknownGroup(String),
}

/// One task entry in a group document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub id: String,
    pub prompt: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(rename = "type", default)]
    pub task_type: TaskType,
    /// Parameter name -> path expression for dependency injection.
    #[serde(default)]
    pub input_mapping: InputMapping,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl From<&TaskSpec> for Task {
    fn from(spec: &TaskSpec) -> Self {
        Task {
            id: spec.id.clone(),
            prompt: spec.prompt.clone(),
            depends_on: spec.depends_on.clone(),
            task_type: spec.task_type,
            metadata: spec.metadata.clone(),
        }
    }
}

/// A group of dependent tasks executed as one DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskGroup {
    pub group_id: String,
    #[serde(default)]
    pub description: String,
    pub tasks: Vec<TaskSpec>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl TaskGroup {
    /// The group's tasks as scheduler input.
    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.iter().map(Task::from).collect()
    }

    /// The group's per-task input mappings, keyed by task id. Tasks without
    /// a mapping are omitted.
    pub fn input_mappings(&self) -> InputMappings {
        self.tasks
            .iter()
            .filter(|spec| !spec.input_mapping.is_empty())
            .map(|spec| (spec.id.clone(), spec.input_mapping.clone()))
            .collect()
    }
}

/// A whole task-group document: free-form metadata plus the groups.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskGroupDocument {
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub groups: Vec<TaskGroup>,
}

impl TaskGroupDocument {
    /// Parse a document from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, LoadError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse a document from a file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Look up a group by id.
    pub fn group(&self, group_id: &str) -> Result<&TaskGroup, LoadError> {
        self.groups
            .iter()
            .find(|group| group.group_id == group_id)
            .ok_or_else(|| LoadError::UnknownGroup(group_id.to_string()))
    }
}
