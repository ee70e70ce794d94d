//! # promptdag
//!
//! A multi-agent task scheduler that executes a DAG of prompts by delegating
//! each task to an external agent CLI (`claude`, `codex`, `gemini`).
//!
//! The core is four cooperating components:
//!
//! - [`agent::AgentRunner`] — spawns one agent-CLI child process per task,
//!   enforces the timeout, and harvests the transcript (completion marker,
//!   optional structured payload) into a [`TaskResult`].
//! - [`injection::DependencyInjector`] — resolves path expressions against
//!   upstream results and rewrites downstream prompts (placeholders plus a
//!   readable context block).
//! - [`meta_agent::MetaAgent`] — scores task complexity, renders the matching
//!   prompt template, and optionally appends a summary task.
//! - [`scheduler::DAGScheduler`] — validates the graph, derives topological
//!   batches, and runs each batch concurrently under a semaphore with a
//!   strict barrier between batches.
//!
//! One run is a single in-process execution of one DAG: no persistence, no
//! resume, no cross-host distribution.

pub mod agent;
pub mod injection;
pub mod loader;
pub mod meta_agent;
pub mod scheduler;
pub mod task;
pub mod tasks;
pub mod utilities;

pub use agent::cli::AgentCli;
pub use agent::{AgentRunner, TaskExecutor};
pub use injection::{DependencyInjector, InjectionError, InputMapping, InputMappings};
pub use loader::{TaskGroup, TaskGroupDocument, TaskSpec};
pub use meta_agent::MetaAgent;
pub use scheduler::{
    BatchPlan, ConfigError, DAGScheduler, FailurePolicy, SchedulerError, SchedulerOptions,
};
pub use task::{Task, TaskType};
pub use tasks::run_result::{BatchStats, RunResult};
pub use tasks::task_result::TaskResult;
pub use tasks::task_state::TaskState;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
