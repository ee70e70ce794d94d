//! Agent process execution.
//!
//! [`AgentRunner`] spawns one agent-CLI child process per task, enforces the
//! task timeout, and harvests the transcript into a [`TaskResult`]. The
//! [`TaskExecutor`] trait is the seam between the scheduler and process
//! spawning; tests substitute scripted executors.

pub mod cli;
pub mod transcript;

use async_trait::async_trait;
use std::time::{Duration, Instant};

use crate::tasks::task_result::TaskResult;
use cli::AgentCli;

/// Longest stderr excerpt carried into a failure reason.
const MAX_STDERR_CHARS: usize = 500;

/// Executes one prompt against one agent and yields one result.
///
/// Implementations never return errors: every failure mode is reported
/// through `TaskResult { success: false, error }`.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Run `prompt` on the agent named `agent_name`, bounded by
    /// `timeout_seconds`. When `expects_structured` is set, attempt to
    /// extract a structured payload from the transcript (best-effort).
    async fn execute(
        &self,
        task_id: &str,
        prompt: &str,
        agent_name: &str,
        timeout_seconds: f64,
        expects_structured: bool,
    ) -> TaskResult;
}

/// Production executor backed by external agent CLIs.
///
/// Stateless: every call spawns a fresh child process, and two invocations
/// with identical inputs are independent. No caching at this layer.
#[derive(Debug, Clone, Default)]
pub struct AgentRunner;

impl AgentRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self
    }

    async fn run(
        &self,
        task_id: &str,
        prompt: &str,
        agent_name: &str,
        timeout_seconds: f64,
        expects_structured: bool,
    ) -> TaskResult {
        let Some(agent) = AgentCli::resolve(agent_name) else {
            log::warn!("task {}: unknown agent '{}'", task_id, agent_name);
            return TaskResult::failure(task_id, format!("unknown agent: {}", agent_name), 0.0);
        };

        let mut command = agent.build_command(prompt);
        let started = Instant::now();

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return TaskResult::failure(
                    task_id,
                    format!("failed to spawn '{}': {}", agent.program(), e),
                    started.elapsed().as_secs_f64(),
                );
            }
        };

        log::debug!(
            "task {}: spawned {} (timeout {}s)",
            task_id,
            agent.program(),
            timeout_seconds
        );

        let deadline = Duration::from_secs_f64(timeout_seconds.max(0.0));
        let output = match tokio::time::timeout(deadline, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return TaskResult::failure(
                    task_id,
                    format!("child process error: {}", e),
                    started.elapsed().as_secs_f64(),
                );
            }
            // Dropping the timed-out future reaps the child via kill_on_drop.
            Err(_) => {
                log::warn!("task {}: timeout after {}s", task_id, timeout_seconds);
                return TaskResult::failure(task_id, "timeout", started.elapsed().as_secs_f64());
            }
        };
        let latency = started.elapsed().as_secs_f64();

        if !output.status.success() {
            let stderr = transcript::clean(&output.stderr);
            let mut reason: String = stderr.trim().chars().take(MAX_STDERR_CHARS).collect();
            if reason.is_empty() {
                reason = format!("exit status {}", output.status);
            }
            log::warn!("task {}: agent exited with failure: {}", task_id, reason);
            return TaskResult::failure(task_id, reason, latency);
        }

        let mut text = transcript::clean(&output.stdout);
        if agent.emits_json_envelope() {
            if let Some(unwrapped) = transcript::unwrap_envelope(&text) {
                text = unwrapped;
            }
        }

        let Some(final_answer) = transcript::extract_final_answer(&text) else {
            log::warn!("task {}: transcript carries no completion marker", task_id);
            return TaskResult::failure_with_output(task_id, "no final answer", text, latency);
        };

        let parsed_data = if expects_structured {
            transcript::extract_structured(&text)
        } else {
            Default::default()
        };

        log::info!(
            "task {}: completed in {:.2}s ({} structured keys)",
            task_id,
            latency,
            parsed_data.len()
        );
        TaskResult::completed(task_id, text, final_answer, latency).with_parsed_data(parsed_data)
    }
}

#[async_trait]
impl TaskExecutor for AgentRunner {
    async fn execute(
        &self,
        task_id: &str,
        prompt: &str,
        agent_name: &str,
        timeout_seconds: f64,
        expects_structured: bool,
    ) -> TaskResult {
        self.run(task_id, prompt, agent_name, timeout_seconds, expects_structured)
            .await
    }
}
