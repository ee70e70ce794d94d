//! Per-task execution state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a task during a run.
///
/// Transitions:
/// `Pending -> Ready` when all upstreams reach a terminal state,
/// `Ready -> Running` when a concurrency slot is acquired,
/// `Running -> Succeeded | Failed` on the runner's verdict,
/// `Pending -> Skipped` when an upstream failed under the skip policy.
/// Terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Waiting on upstream tasks.
    Pending,
    /// All upstreams settled; waiting for a concurrency slot.
    Ready,
    /// Handed to the agent runner.
    Running,
    /// Runner reported success.
    Succeeded,
    /// Runner reported failure, or the task was cancelled.
    Failed,
    /// Never executed because an upstream did not succeed.
    Skipped,
}

impl TaskState {
    /// Whether this state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed | TaskState::Skipped)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Pending => write!(f, "pending"),
            TaskState::Ready => write!(f, "ready"),
            TaskState::Running => write!(f, "running"),
            TaskState::Succeeded => write!(f, "succeeded"),
            TaskState::Failed => write!(f, "failed"),
            TaskState::Skipped => write!(f, "skipped"),
        }
    }
}
