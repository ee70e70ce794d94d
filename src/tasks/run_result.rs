//! Aggregate outcome of one DAG run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use super::task_result::TaskResult;
use super::task_state::TaskState;

/// Size and duration of one executed batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchStats {
    /// Zero-based batch index in topological order.
    pub index: usize,
    /// Number of tasks in the batch.
    pub size: usize,
    /// Wall-clock seconds from batch start to the batch barrier.
    pub duration: f64,
}

/// The aggregate result of one `execute_dag` call.
///
/// Always carries the full per-task outcome map so callers can diagnose
/// failures without re-running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Unique id of this run.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Per-task outcomes, one entry for every task in the DAG.
    pub per_task: HashMap<String, TaskResult>,
    /// Final state of every task.
    pub states: HashMap<String, TaskState>,
    /// Number of tasks that succeeded.
    pub completed: usize,
    /// Number of tasks that failed or were skipped.
    pub failed: usize,
    /// Total number of tasks.
    pub total: usize,
    /// `completed / total`; 1.0 by convention for an empty run.
    pub success_rate: f64,
    /// Number of batches executed.
    pub batch_count: usize,
    /// Per-batch sizes and durations, in execution order.
    pub batches: Vec<BatchStats>,
    /// Wall-clock seconds for the whole run.
    pub total_time: f64,
    /// Lenient-injection substitutions recorded under `continue_partial`.
    #[serde(default)]
    pub injection_warnings: Vec<String>,
    /// Free-form run metadata.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl RunResult {
    /// An empty result shell for a run that is about to execute.
    pub fn new(run_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            started_at,
            per_task: HashMap::new(),
            states: HashMap::new(),
            completed: 0,
            failed: 0,
            total: 0,
            success_rate: 1.0,
            batch_count: 0,
            batches: Vec::new(),
            total_time: 0.0,
            injection_warnings: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    /// Recompute totals from the per-task map.
    pub fn finalize(&mut self) {
        self.total = self.per_task.len();
        self.completed = self.per_task.values().filter(|r| r.success).count();
        self.failed = self.total - self.completed;
        self.success_rate = if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        };
        self.batch_count = self.batches.len();
    }

    /// Whether every task in the run succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RunResult(run_id={}, completed={}/{}, batches={}, total_time={:.2}s)",
            self.run_id, self.completed, self.total, self.batch_count, self.total_time
        )
    }
}
