//! The orchestration core.
//!
//! `DAGScheduler` owns the task set for one run: it validates the graph,
//! derives topological batches, and executes each batch concurrently under a
//! semaphore, with a strict barrier between batches. Upstream results flow
//! into downstream prompts through the dependency injector before each task
//! is handed to the executor.

pub mod graph;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::agent::cli::AgentCli;
use crate::agent::TaskExecutor;
use crate::injection::{DependencyInjector, InjectorOptions, InputMappings};
use crate::meta_agent::MetaAgent;
use crate::task::Task;
use crate::tasks::run_result::{BatchStats, RunResult};
use crate::tasks::task_result::TaskResult;
use crate::tasks::task_state::TaskState;
use crate::utilities::Logger;

pub use graph::{build_batch_plan, BatchPlan, ConfigError};

/// Fan-out multiplier applied to hardware parallelism when no explicit
/// concurrency bound is configured.
const PARALLELISM_FACTOR: usize = 4;

/// What happens to siblings and descendants after one task fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Cancel running siblings, skip everything not yet started, return.
    FailFast,
    /// Skip every task whose transitive upstream set contains a failure.
    #[default]
    SkipDownstream,
    /// Run downstream tasks anyway, substituting `null` for unresolvable
    /// injections and recording a warning per substitution.
    ContinuePartial,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::FailFast => write!(f, "fail_fast"),
            FailurePolicy::SkipDownstream => write!(f, "skip_downstream"),
            FailurePolicy::ContinuePartial => write!(f, "continue_partial"),
        }
    }
}

/// Options governing one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerOptions {
    /// Agent used for tasks the agent mapping does not name.
    pub default_agent: String,
    /// Rewrite prompts through the MetaAgent before execution.
    pub use_meta_agent: bool,
    /// With the MetaAgent enabled, append the synthetic summary task.
    pub add_summary: bool,
    /// Ask the runner to attempt structured parsing of transcripts.
    pub extract_data: bool,
    /// Upper bound on concurrent tasks per batch. Unset means
    /// `min(batch_size, hardware_parallelism * 4)`.
    pub max_concurrent_per_batch: Option<usize>,
    /// Per-task timeout in seconds.
    pub timeout_seconds: f64,
    /// Failure policy for siblings and descendants.
    pub failure_policy: FailurePolicy,
    /// Forbid the injector's JSON re-parse fallback.
    pub strict_reparse: bool,
    /// Enable the progress stream.
    pub verbose: bool,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            default_agent: "claude".to_string(),
            use_meta_agent: false,
            add_summary: true,
            extract_data: true,
            max_concurrent_per_batch: None,
            timeout_seconds: 120.0,
            failure_policy: FailurePolicy::default(),
            strict_reparse: false,
            verbose: false,
        }
    }
}

/// Errors that abort a run before or during execution.
#[derive(Debug, Clone, Error)]
pub enum SchedulerError {
    /// The task set is invalid; nothing ran.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Invariant violation inside the scheduler. Surfaced, never swallowed.
    #[error("internal scheduler error: {message}")]
    Internal { message: String },
}

/// The DAG scheduler. Owns its executor and options; holds no process-wide
/// state.
pub struct DAGScheduler {
    executor: Arc<dyn TaskExecutor>,
    options: SchedulerOptions,
    injector: DependencyInjector,
    logger: Logger,
}

impl DAGScheduler {
    /// Create a scheduler with explicit options.
    pub fn new(executor: Arc<dyn TaskExecutor>, options: SchedulerOptions) -> Self {
        let injector = DependencyInjector::with_options(InjectorOptions {
            strict_reparse: options.strict_reparse,
        });
        let logger = Logger::new(options.verbose);
        Self {
            executor,
            options,
            injector,
            logger,
        }
    }

    /// Create a scheduler with default options.
    pub fn with_defaults(executor: Arc<dyn TaskExecutor>) -> Self {
        Self::new(executor, SchedulerOptions::default())
    }

    /// The options this scheduler runs with.
    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    /// Execute one DAG.
    ///
    /// `agent_mapping` assigns an agent per task id; omitted tasks use the
    /// default agent. `input_mappings` carries each task's parameter -> path
    /// expression table.
    ///
    /// Validation failures (duplicate ids, dangling dependencies, cycles,
    /// unknown agents) reject the whole run before any child process spawns.
    /// Individual task failures never abort the run; they surface in the
    /// returned [`RunResult`] according to the failure policy.
    pub async fn execute_dag(
        &self,
        tasks: Vec<Task>,
        agent_mapping: &HashMap<String, String>,
        input_mappings: &InputMappings,
    ) -> Result<RunResult, SchedulerError> {
        let run_id = Uuid::new_v4();
        let started_at = chrono::Utc::now();
        let clock = Instant::now();

        let mut input_mappings = input_mappings.clone();
        let tasks = if self.options.use_meta_agent {
            let meta = MetaAgent::new(self.options.verbose);
            meta.process_tasks(tasks, &mut input_mappings, self.options.add_summary)
        } else {
            tasks
        };

        for task in &tasks {
            let agent = agent_mapping
                .get(&task.id)
                .unwrap_or(&self.options.default_agent);
            if AgentCli::resolve(agent).is_none() {
                return Err(ConfigError::UnknownAgent {
                    id: task.id.clone(),
                    agent: agent.clone(),
                }
                .into());
            }
        }

        let plan = graph::build_batch_plan(&tasks)?;
        self.logger.info(&format!(
            "run {}: {} tasks in {} batches",
            run_id,
            tasks.len(),
            plan.len()
        ));

        let task_index: Arc<HashMap<String, Task>> = Arc::new(
            tasks
                .into_iter()
                .map(|task| (task.id.clone(), task))
                .collect(),
        );
        let input_mappings = Arc::new(input_mappings);

        // The only cross-task shared state: each cell written exactly once,
        // reads downstream of the batch barrier.
        let results: Arc<DashMap<String, TaskResult>> = Arc::new(DashMap::new());
        let states: Arc<DashMap<String, TaskState>> = Arc::new(DashMap::new());
        for id in task_index.keys() {
            states.insert(id.clone(), TaskState::Pending);
        }
        let warnings: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        let mut run = RunResult::new(run_id, started_at);
        let mut cancelled = false;

        for (batch_index, batch) in plan.batches.iter().enumerate() {
            let batch_clock = Instant::now();
            self.logger.info(&format!(
                "batch {}/{}: {} task(s)",
                batch_index + 1,
                plan.len(),
                batch.len()
            ));

            let runnable = self.partition_batch(batch, &task_index, &states, &results);
            let limit = effective_limit(self.options.max_concurrent_per_batch, runnable.len());
            let semaphore = Arc::new(Semaphore::new(limit));
            let mut join_set: JoinSet<(String, bool)> = JoinSet::new();

            for id in runnable {
                join_set.spawn(self.spawn_task(
                    id,
                    agent_mapping,
                    Arc::clone(&task_index),
                    Arc::clone(&input_mappings),
                    Arc::clone(&results),
                    Arc::clone(&states),
                    Arc::clone(&warnings),
                    Arc::clone(&semaphore),
                ));
            }

            // Barrier: every task in the batch settles before the next batch
            // starts, even when some failed.
            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok((id, success)) => {
                        if !success
                            && self.options.failure_policy == FailurePolicy::FailFast
                            && !cancelled
                        {
                            cancelled = true;
                            self.logger
                                .warning(&format!("task {} failed, cancelling run", id));
                            join_set.abort_all();
                        }
                    }
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => {
                        return Err(SchedulerError::Internal {
                            message: format!("worker panicked: {}", e),
                        })
                    }
                }
            }

            // Reconcile tasks torn down by abort_all: running ones count as
            // cancelled failures, queued ones were never started.
            for id in batch {
                let state = states.get(id).map(|s| *s).unwrap_or(TaskState::Pending);
                if !state.is_terminal() {
                    let terminal = if state == TaskState::Running {
                        TaskState::Failed
                    } else {
                        TaskState::Skipped
                    };
                    states.insert(id.clone(), terminal);
                    results.insert(id.clone(), TaskResult::failure(id.as_str(), "cancelled", 0.0));
                }
            }

            run.batches.push(BatchStats {
                index: batch_index,
                size: batch.len(),
                duration: batch_clock.elapsed().as_secs_f64(),
            });

            if cancelled {
                break;
            }
        }

        // Under fail-fast, everything in later batches never started.
        for id in task_index.keys() {
            if !results.contains_key(id) {
                states.insert(id.clone(), TaskState::Skipped);
                results.insert(id.clone(), TaskResult::failure(id.as_str(), "cancelled", 0.0));
            }
        }

        for entry in results.iter() {
            run.per_task
                .insert(entry.key().clone(), entry.value().clone());
        }
        for entry in states.iter() {
            run.states.insert(entry.key().clone(), *entry.value());
        }
        run.injection_warnings = std::mem::take(&mut *warnings.lock());
        run.metadata.insert(
            "failure_policy".to_string(),
            serde_json::Value::String(self.options.failure_policy.to_string()),
        );
        run.metadata.insert(
            "use_meta_agent".to_string(),
            serde_json::Value::Bool(self.options.use_meta_agent),
        );
        run.total_time = clock.elapsed().as_secs_f64();
        run.finalize();

        self.logger.success(&format!(
            "run {}: {}/{} succeeded in {:.2}s across {} batches",
            run_id, run.completed, run.total, run.total_time, run.batch_count
        ));
        Ok(run)
    }

    /// Decide which tasks in a batch actually run, settling the rest.
    fn partition_batch(
        &self,
        batch: &[String],
        task_index: &HashMap<String, Task>,
        states: &DashMap<String, TaskState>,
        results: &DashMap<String, TaskResult>,
    ) -> Vec<String> {
        let mut runnable = Vec::with_capacity(batch.len());
        for id in batch {
            let task = &task_index[id];
            let failed_upstream = task.depends_on.iter().find(|upstream| {
                states.get(upstream.as_str()).map(|s| *s) != Some(TaskState::Succeeded)
            });

            match failed_upstream {
                Some(upstream) if self.options.failure_policy != FailurePolicy::ContinuePartial => {
                    self.logger
                        .warning(&format!("task {}: skipped (upstream {})", id, upstream));
                    states.insert(id.clone(), TaskState::Skipped);
                    results.insert(id.clone(), TaskResult::skipped(id, upstream));
                }
                _ => {
                    states.insert(id.clone(), TaskState::Ready);
                    runnable.push(id.clone());
                }
            }
        }
        runnable
    }

    /// Build the future that runs one task: acquire a slot, inject upstream
    /// data, execute, record the outcome.
    #[allow(clippy::too_many_arguments)]
    fn spawn_task(
        &self,
        id: String,
        agent_mapping: &HashMap<String, String>,
        task_index: Arc<HashMap<String, Task>>,
        input_mappings: Arc<InputMappings>,
        results: Arc<DashMap<String, TaskResult>>,
        states: Arc<DashMap<String, TaskState>>,
        warnings: Arc<Mutex<Vec<String>>>,
        semaphore: Arc<Semaphore>,
    ) -> impl std::future::Future<Output = (String, bool)> + Send + 'static {
        let agent = agent_mapping
            .get(&id)
            .cloned()
            .unwrap_or_else(|| self.options.default_agent.clone());
        let executor = Arc::clone(&self.executor);
        let injector = self.injector.clone();
        let timeout_seconds = self.options.timeout_seconds;
        let extract_data = self.options.extract_data;
        let lenient = self.options.failure_policy == FailurePolicy::ContinuePartial;

        async move {
            let task = &task_index[&id];
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    states.insert(id.clone(), TaskState::Failed);
                    results.insert(id.clone(), TaskResult::failure(id.as_str(), "cancelled", 0.0));
                    return (id, false);
                }
            };
            states.insert(id.clone(), TaskState::Running);

            let mut upstream = HashMap::with_capacity(task.depends_on.len());
            for dependency in &task.depends_on {
                if let Some(result) = results.get(dependency) {
                    upstream.insert(dependency.clone(), result.value().clone());
                }
            }

            let prompt = match input_mappings.get(&id) {
                None => task.prompt.clone(),
                Some(mapping) if mapping.is_empty() => task.prompt.clone(),
                Some(mapping) if lenient => {
                    let (prompt, mut new_warnings) =
                        injector.inject_lenient(task, &upstream, mapping);
                    if !new_warnings.is_empty() {
                        warnings.lock().append(&mut new_warnings);
                    }
                    prompt
                }
                Some(mapping) => match injector.inject(task, &upstream, mapping) {
                    Ok(prompt) => prompt,
                    Err(e) => {
                        log::warn!("task {}: injection failed: {}", id, e);
                        states.insert(id.clone(), TaskState::Failed);
                        results
                            .insert(id.clone(), TaskResult::failure(id.as_str(), e.to_string(), 0.0));
                        return (id, false);
                    }
                },
            };

            let result = executor
                .execute(&id, &prompt, &agent, timeout_seconds, extract_data)
                .await;
            let success = result.success;
            states.insert(
                id.clone(),
                if success {
                    TaskState::Succeeded
                } else {
                    TaskState::Failed
                },
            );
            results.insert(id.clone(), result);
            (id, success)
        }
    }
}

impl fmt::Debug for DAGScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DAGScheduler")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// The per-batch concurrency ceiling: the configured bound when set,
/// otherwise `min(batch_size, hardware_parallelism * 4)` so very wide
/// fan-outs cannot fork-bomb the host.
fn effective_limit(configured: Option<usize>, batch_size: usize) -> usize {
    match configured {
        Some(limit) => limit.max(1),
        None => {
            let hardware = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1);
            batch_size.min(hardware * PARALLELISM_FACTOR).max(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::injection::InputMapping;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashSet;
    use std::time::Duration;

    /// Scripted executor: configurable answers, structured payloads, failures
    /// and delays per task, plus a record of every prompt and time span.
    #[derive(Default)]
    struct ScriptedExecutor {
        answers: HashMap<String, String>,
        parsed: HashMap<String, HashMap<String, serde_json::Value>>,
        failures: HashSet<String>,
        delays: HashMap<String, Duration>,
        prompts: Mutex<HashMap<String, String>>,
        spans: Mutex<HashMap<String, (Instant, Instant)>>,
    }

    impl ScriptedExecutor {
        fn new() -> Self {
            Self::default()
        }

        fn answer(mut self, id: &str, answer: &str) -> Self {
            self.answers.insert(id.to_string(), answer.to_string());
            self
        }

        fn parsed(mut self, id: &str, value: serde_json::Value) -> Self {
            if let serde_json::Value::Object(map) = value {
                self.parsed
                    .insert(id.to_string(), map.into_iter().collect());
            }
            self
        }

        fn fail(mut self, id: &str) -> Self {
            self.failures.insert(id.to_string());
            self
        }

        fn delay(mut self, id: &str, millis: u64) -> Self {
            self.delays
                .insert(id.to_string(), Duration::from_millis(millis));
            self
        }

        fn prompt_for(&self, id: &str) -> Option<String> {
            self.prompts.lock().get(id).cloned()
        }

        fn executed(&self, id: &str) -> bool {
            self.prompts.lock().contains_key(id)
        }

        fn span(&self, id: &str) -> (Instant, Instant) {
            self.spans.lock()[id]
        }
    }

    #[async_trait]
    impl TaskExecutor for ScriptedExecutor {
        async fn execute(
            &self,
            task_id: &str,
            prompt: &str,
            _agent_name: &str,
            _timeout_seconds: f64,
            _expects_structured: bool,
        ) -> TaskResult {
            let start = Instant::now();
            self.prompts
                .lock()
                .insert(task_id.to_string(), prompt.to_string());
            if let Some(delay) = self.delays.get(task_id) {
                tokio::time::sleep(*delay).await;
            }
            let result = if self.failures.contains(task_id) {
                TaskResult::failure(task_id, "timeout", 0.1)
            } else {
                let answer = self
                    .answers
                    .get(task_id)
                    .cloned()
                    .unwrap_or_else(|| format!("done-{}", task_id));
                let output = format!("work...\nFINAL_ANSWER: {}", answer);
                TaskResult::completed(task_id, output, answer, 0.1).with_parsed_data(
                    self.parsed.get(task_id).cloned().unwrap_or_default(),
                )
            };
            self.spans
                .lock()
                .insert(task_id.to_string(), (start, Instant::now()));
            result
        }
    }

    fn scheduler(executor: Arc<ScriptedExecutor>, options: SchedulerOptions) -> DAGScheduler {
        DAGScheduler::new(executor, options)
    }

    fn mapping(pairs: &[(&str, &str)]) -> InputMapping {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_two_task_linear_with_injection() {
        let executor = Arc::new(ScriptedExecutor::new().answer("A", "hello"));
        let sched = scheduler(Arc::clone(&executor), SchedulerOptions::default());

        let tasks = vec![
            Task::new("A", "echo hello"),
            Task::with_dependencies("B", "say: {msg}", vec!["A".to_string()]),
        ];
        let mappings =
            InputMappings::from([("B".to_string(), mapping(&[("msg", "A.final_answer")]))]);

        let run = sched
            .execute_dag(tasks, &HashMap::new(), &mappings)
            .await
            .unwrap();

        assert_eq!(run.batch_count, 2);
        assert_eq!(run.completed, 2);
        assert!((run.success_rate - 1.0).abs() < f64::EPSILON);
        let b_prompt = executor.prompt_for("B").unwrap();
        assert!(b_prompt.contains("say: \"hello\""), "got: {}", b_prompt);
    }

    #[tokio::test]
    async fn test_diamond_batches_and_downstream_observation() {
        let executor = Arc::new(
            ScriptedExecutor::new()
                .answer("B", "from-b")
                .answer("C", "from-c"),
        );
        let sched = scheduler(Arc::clone(&executor), SchedulerOptions::default());

        let tasks = vec![
            Task::new("A", "root"),
            Task::with_dependencies("B", "left", vec!["A".to_string()]),
            Task::with_dependencies("C", "right", vec!["A".to_string()]),
            Task::with_dependencies("D", "merge {b} {c}", vec!["B".to_string(), "C".to_string()]),
        ];
        let mappings = InputMappings::from([(
            "D".to_string(),
            mapping(&[("b", "B.final_answer"), ("c", "C.final_answer")]),
        )]);

        let run = sched
            .execute_dag(tasks, &HashMap::new(), &mappings)
            .await
            .unwrap();

        assert_eq!(run.batch_count, 3);
        let sizes: Vec<usize> = run.batches.iter().map(|b| b.size).collect();
        assert_eq!(sizes, vec![1, 2, 1]);

        let d_prompt = executor.prompt_for("D").unwrap();
        assert!(d_prompt.contains("\"from-b\""));
        assert!(d_prompt.contains("\"from-c\""));
        assert_eq!(run.completed, 4);
    }

    #[tokio::test]
    async fn test_fan_out_runs_concurrently() {
        let mut executor = ScriptedExecutor::new();
        for leaf in ["L1", "L2", "L3", "L4"] {
            executor = executor.delay(leaf, 100);
        }
        let executor = Arc::new(executor);
        let options = SchedulerOptions {
            max_concurrent_per_batch: Some(4),
            ..SchedulerOptions::default()
        };
        let sched = scheduler(Arc::clone(&executor), options);

        let mut tasks = vec![Task::new("A", "root")];
        for leaf in ["L1", "L2", "L3", "L4"] {
            tasks.push(Task::with_dependencies(leaf, "leaf", vec!["A".to_string()]));
        }

        let run = sched
            .execute_dag(tasks, &HashMap::new(), &InputMappings::new())
            .await
            .unwrap();

        assert_eq!(run.batch_count, 2);
        assert_eq!(run.completed, 5);
        // Four 100ms leaves overlapping: the batch takes well under the
        // 400ms a sequential schedule would need.
        assert!(
            run.batches[1].duration < 0.35,
            "leaf batch took {:.3}s",
            run.batches[1].duration
        );
    }

    #[tokio::test]
    async fn test_concurrency_bound_serializes_batch() {
        let mut executor = ScriptedExecutor::new();
        for leaf in ["L1", "L2", "L3", "L4"] {
            executor = executor.delay(leaf, 50);
        }
        let executor = Arc::new(executor);
        let options = SchedulerOptions {
            max_concurrent_per_batch: Some(1),
            ..SchedulerOptions::default()
        };
        let sched = scheduler(Arc::clone(&executor), options);

        let mut tasks = vec![Task::new("A", "root")];
        for leaf in ["L1", "L2", "L3", "L4"] {
            tasks.push(Task::with_dependencies(leaf, "leaf", vec!["A".to_string()]));
        }

        let run = sched
            .execute_dag(tasks, &HashMap::new(), &InputMappings::new())
            .await
            .unwrap();

        // One slot: the four 50ms leaves cannot overlap.
        assert!(
            run.batches[1].duration >= 0.19,
            "leaf batch took {:.3}s",
            run.batches[1].duration
        );
    }

    #[tokio::test]
    async fn test_upstream_finishes_before_downstream_starts() {
        let executor = Arc::new(ScriptedExecutor::new().delay("A", 50));
        let sched = scheduler(Arc::clone(&executor), SchedulerOptions::default());

        let tasks = vec![
            Task::new("A", "root"),
            Task::with_dependencies("B", "after", vec!["A".to_string()]),
        ];
        sched
            .execute_dag(tasks, &HashMap::new(), &InputMappings::new())
            .await
            .unwrap();

        let (_, a_finish) = executor.span("A");
        let (b_start, _) = executor.span("B");
        assert!(a_finish <= b_start);
    }

    #[tokio::test]
    async fn test_cycle_rejected_before_any_execution() {
        let executor = Arc::new(ScriptedExecutor::new());
        let sched = scheduler(Arc::clone(&executor), SchedulerOptions::default());

        let tasks = vec![
            Task::with_dependencies("A", "p", vec!["C".to_string()]),
            Task::with_dependencies("B", "p", vec!["A".to_string()]),
            Task::with_dependencies("C", "p", vec!["B".to_string()]),
        ];
        let err = sched
            .execute_dag(tasks, &HashMap::new(), &InputMappings::new())
            .await
            .unwrap_err();

        match err {
            SchedulerError::Config(ConfigError::Cycle { id }) => {
                assert!(["A", "B", "C"].contains(&id.as_str()));
            }
            other => panic!("expected cycle rejection, got {:?}", other),
        }
        assert!(executor.prompts.lock().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_agent_rejected() {
        let executor = Arc::new(ScriptedExecutor::new());
        let sched = scheduler(Arc::clone(&executor), SchedulerOptions::default());

        let err = sched
            .execute_dag(
                vec![Task::new("A", "p")],
                &HashMap::from([("A".to_string(), "hal9000".to_string())]),
                &InputMappings::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::Config(ConfigError::UnknownAgent { .. })
        ));
        assert!(!executor.executed("A"));
    }

    #[tokio::test]
    async fn test_skip_downstream_policy() {
        let executor = Arc::new(ScriptedExecutor::new().fail("A"));
        let sched = scheduler(Arc::clone(&executor), SchedulerOptions::default());

        let tasks = vec![
            Task::new("A", "will fail"),
            Task::with_dependencies("B", "never runs", vec!["A".to_string()]),
        ];
        let run = sched
            .execute_dag(tasks, &HashMap::new(), &InputMappings::new())
            .await
            .unwrap();

        assert_eq!(run.states["A"], TaskState::Failed);
        assert_eq!(run.states["B"], TaskState::Skipped);
        assert!(!executor.executed("B"));
        assert!((run.success_rate - 0.0).abs() < f64::EPSILON);
        assert!(run.per_task["B"]
            .error
            .as_deref()
            .unwrap()
            .contains("'A'"));
    }

    #[tokio::test]
    async fn test_skip_is_transitive() {
        let executor = Arc::new(ScriptedExecutor::new().fail("A"));
        let sched = scheduler(Arc::clone(&executor), SchedulerOptions::default());

        let tasks = vec![
            Task::new("A", "fails"),
            Task::with_dependencies("B", "skipped", vec!["A".to_string()]),
            Task::with_dependencies("C", "also skipped", vec!["B".to_string()]),
        ];
        let run = sched
            .execute_dag(tasks, &HashMap::new(), &InputMappings::new())
            .await
            .unwrap();

        assert_eq!(run.states["B"], TaskState::Skipped);
        assert_eq!(run.states["C"], TaskState::Skipped);
        assert!(!executor.executed("C"));
    }

    #[tokio::test]
    async fn test_continue_partial_runs_with_nulls() {
        let executor = Arc::new(ScriptedExecutor::new().fail("A"));
        let options = SchedulerOptions {
            failure_policy: FailurePolicy::ContinuePartial,
            ..SchedulerOptions::default()
        };
        let sched = scheduler(Arc::clone(&executor), options);

        let tasks = vec![
            Task::new("A", "fails"),
            Task::with_dependencies("B", "use {value}", vec!["A".to_string()]),
        ];
        let mappings =
            InputMappings::from([("B".to_string(), mapping(&[("value", "A.count")]))]);
        let run = sched
            .execute_dag(tasks, &HashMap::new(), &mappings)
            .await
            .unwrap();

        assert!(executor.executed("B"));
        assert_eq!(run.states["B"], TaskState::Succeeded);
        let b_prompt = executor.prompt_for("B").unwrap();
        assert!(b_prompt.contains("use null"));
        assert_eq!(run.injection_warnings.len(), 1);
        assert!(run.injection_warnings[0].contains("A.count"));
    }

    #[tokio::test]
    async fn test_fail_fast_cancels_running_and_skips_rest() {
        // A fails shortly after B has started its long sleep.
        let executor = Arc::new(ScriptedExecutor::new().fail("A").delay("A", 10).delay("B", 5_000));
        let options = SchedulerOptions {
            failure_policy: FailurePolicy::FailFast,
            ..SchedulerOptions::default()
        };
        let sched = scheduler(Arc::clone(&executor), options);

        let tasks = vec![
            Task::new("A", "fails fast"),
            Task::new("B", "slow sibling"),
            Task::with_dependencies("C", "never starts", vec!["B".to_string()]),
        ];
        let started = Instant::now();
        let run = sched
            .execute_dag(tasks, &HashMap::new(), &InputMappings::new())
            .await
            .unwrap();

        // The 5s sibling was torn down, not awaited.
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(run.states["A"], TaskState::Failed);
        assert_eq!(run.states["B"], TaskState::Failed);
        assert_eq!(run.per_task["B"].error.as_deref(), Some("cancelled"));
        assert_eq!(run.states["C"], TaskState::Skipped);
        assert_eq!(run.per_task["C"].error.as_deref(), Some("cancelled"));
        assert_eq!(run.completed, 0);
    }

    #[tokio::test]
    async fn test_empty_task_set() {
        let executor = Arc::new(ScriptedExecutor::new());
        let sched = scheduler(executor, SchedulerOptions::default());
        let run = sched
            .execute_dag(Vec::new(), &HashMap::new(), &InputMappings::new())
            .await
            .unwrap();
        assert_eq!(run.batch_count, 0);
        assert_eq!(run.total, 0);
        assert!((run.success_rate - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_single_task_single_batch() {
        let executor = Arc::new(ScriptedExecutor::new());
        let sched = scheduler(executor, SchedulerOptions::default());
        let run = sched
            .execute_dag(
                vec![Task::new("only", "p")],
                &HashMap::new(),
                &InputMappings::new(),
            )
            .await
            .unwrap();
        assert_eq!(run.batch_count, 1);
        assert_eq!(run.batches[0].size, 1);
        assert_eq!(run.completed, 1);
    }

    #[tokio::test]
    async fn test_meta_agent_summary_sees_leaf_answers() {
        let executor = Arc::new(
            ScriptedExecutor::new()
                .answer("t1", "five users")
                .answer("t2", "42 files"),
        );
        let options = SchedulerOptions {
            use_meta_agent: true,
            add_summary: true,
            ..SchedulerOptions::default()
        };
        let sched = scheduler(Arc::clone(&executor), options);

        let tasks = vec![
            Task::new("t1", "count users"),
            Task::with_dependencies("t2", "count files", vec!["t1".to_string()]),
        ];
        let run = sched
            .execute_dag(tasks, &HashMap::new(), &InputMappings::new())
            .await
            .unwrap();

        assert_eq!(run.total, 3);
        assert_eq!(run.states["final_summary"], TaskState::Succeeded);
        let summary_prompt = executor.prompt_for("final_summary").unwrap();
        // The summary runs last and receives every leaf's final answer.
        assert!(summary_prompt.contains("\"42 files\""));
        assert!(run.batches.last().unwrap().size == 1);
    }

    #[tokio::test]
    async fn test_structured_data_flows_between_batches() {
        let executor = Arc::new(
            ScriptedExecutor::new()
                .parsed("A", json!({"users": ["alice", "bob", "charlie"], "count": 3})),
        );
        let sched = scheduler(Arc::clone(&executor), SchedulerOptions::default());

        let tasks = vec![
            Task::new("A", "list users"),
            Task::with_dependencies("B", "greet {target}, one of {n}", vec!["A".to_string()]),
        ];
        let mappings = InputMappings::from([(
            "B".to_string(),
            mapping(&[("target", "A.users[0]"), ("n", "A.count")]),
        )]);
        let run = sched
            .execute_dag(tasks, &HashMap::new(), &mappings)
            .await
            .unwrap();

        assert_eq!(run.completed, 2);
        let b_prompt = executor.prompt_for("B").unwrap();
        assert!(b_prompt.contains("greet \"alice\", one of 3"));
        assert!(b_prompt.contains("- n: 3 (from A.count)"));
        assert!(b_prompt.contains("- target: \"alice\" (from A.users[0])"));
    }

    #[tokio::test]
    async fn test_injection_failure_fails_downstream_only() {
        let executor = Arc::new(ScriptedExecutor::new());
        let sched = scheduler(Arc::clone(&executor), SchedulerOptions::default());

        let tasks = vec![
            Task::new("A", "root"),
            Task::with_dependencies("B", "use {x}", vec!["A".to_string()]),
        ];
        let mappings =
            InputMappings::from([("B".to_string(), mapping(&[("x", "A.users[10]")]))]);
        let run = sched
            .execute_dag(tasks, &HashMap::new(), &mappings)
            .await
            .unwrap();

        assert_eq!(run.states["A"], TaskState::Succeeded);
        assert_eq!(run.states["B"], TaskState::Failed);
        assert!(!executor.executed("B"));
        assert!(run.per_task["B"]
            .error
            .as_deref()
            .unwrap()
            .contains("A.users[10]"));
    }

    #[tokio::test]
    async fn test_rerun_is_deterministic() {
        let build = || {
            (
                vec![
                    Task::new("A", "root"),
                    Task::with_dependencies("B", "say: {msg}", vec!["A".to_string()]),
                ],
                InputMappings::from([(
                    "B".to_string(),
                    mapping(&[("msg", "A.final_answer")]),
                )]),
            )
        };

        let executor1 = Arc::new(ScriptedExecutor::new().answer("A", "stable"));
        let sched1 = scheduler(Arc::clone(&executor1), SchedulerOptions::default());
        let (tasks, mappings) = build();
        let run1 = sched1
            .execute_dag(tasks, &HashMap::new(), &mappings)
            .await
            .unwrap();

        let executor2 = Arc::new(ScriptedExecutor::new().answer("A", "stable"));
        let sched2 = scheduler(Arc::clone(&executor2), SchedulerOptions::default());
        let (tasks, mappings) = build();
        let run2 = sched2
            .execute_dag(tasks, &HashMap::new(), &mappings)
            .await
            .unwrap();

        assert_eq!(
            run1.per_task["B"].final_answer,
            run2.per_task["B"].final_answer
        );
        assert_eq!(executor1.prompt_for("B"), executor2.prompt_for("B"));
    }

    #[test]
    fn test_effective_limit() {
        assert_eq!(effective_limit(Some(3), 10), 3);
        assert_eq!(effective_limit(Some(0), 10), 1);
        let hardware = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_limit(None, 2), 2.min(hardware * 4));
        assert!(effective_limit(None, 10_000) <= hardware * 4);
    }
}
