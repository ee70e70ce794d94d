//! Per-task execution outcome.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The result of one task, produced exactly once by the agent runner (or by
/// the scheduler for tasks that never ran) and read-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Id of the task this result belongs to.
    pub task_id: String,
    /// Whether the task completed and signalled completion.
    pub success: bool,
    /// Wall-clock seconds from spawn to termination.
    pub latency: f64,
    /// Full textual transcript from the agent CLI.
    pub output: String,
    /// Text following the last completion marker, trimmed.
    pub final_answer: String,
    /// Structured payload extracted from the transcript, when requested and
    /// discovered. Lives in its own namespace, never colliding with
    /// `final_answer` or `output`.
    #[serde(default)]
    pub parsed_data: HashMap<String, serde_json::Value>,
    /// Human-readable failure reason; present only when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskResult {
    /// A successful result with transcript and final answer.
    pub fn completed(
        task_id: impl Into<String>,
        output: impl Into<String>,
        final_answer: impl Into<String>,
        latency: f64,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            success: true,
            latency,
            output: output.into(),
            final_answer: final_answer.into(),
            parsed_data: HashMap::new(),
            error: None,
        }
    }

    /// A failed result with an error reason and no transcript.
    pub fn failure(task_id: impl Into<String>, error: impl Into<String>, latency: f64) -> Self {
        Self {
            task_id: task_id.into(),
            success: false,
            latency,
            output: String::new(),
            final_answer: String::new(),
            parsed_data: HashMap::new(),
            error: Some(error.into()),
        }
    }

    /// A failed result that preserves the transcript (e.g. missing marker).
    pub fn failure_with_output(
        task_id: impl Into<String>,
        error: impl Into<String>,
        output: impl Into<String>,
        latency: f64,
    ) -> Self {
        Self {
            output: output.into(),
            ..Self::failure(task_id, error, latency)
        }
    }

    /// A result for a task skipped because an upstream failed.
    pub fn skipped(task_id: impl Into<String>, upstream: &str) -> Self {
        Self::failure(
            task_id,
            format!("skipped: upstream task '{}' did not succeed", upstream),
            0.0,
        )
    }

    /// Attach structured data extracted from the transcript.
    pub fn with_parsed_data(mut self, parsed_data: HashMap<String, serde_json::Value>) -> Self {
        self.parsed_data = parsed_data;
        self
    }

    /// Whether the transcript yielded any structured data.
    pub fn has_structured_data(&self) -> bool {
        !self.parsed_data.is_empty()
    }
}

impl fmt::Display for TaskResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.success {
            write!(
                f,
                "TaskResult(task_id={}, success=true, latency={:.2}s)",
                self.task_id, self.latency
            )
        } else {
            write!(
                f,
                "TaskResult(task_id={}, success=false, error={})",
                self.task_id,
                self.error.as_deref().unwrap_or("unknown")
            )
        }
    }
}
