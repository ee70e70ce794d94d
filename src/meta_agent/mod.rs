//! Rule-based prompt generation.
//!
//! The MetaAgent runs once, up-front, over the whole task set: it scores each
//! task, renders the matching template, and optionally appends a synthetic
//! summary task that aggregates every leaf result. It is not itself an
//! external AI call.

pub mod complexity;
pub mod templates;

use std::collections::HashMap;

use crate::injection::{InputMapping, InputMappings};
use crate::task::{Task, TaskType};
use crate::utilities::Logger;
use complexity::{ComplexityAnalyzer, ComplexityAnalysis};
use templates::{PromptTemplateLibrary, TemplateKind};

pub use complexity::{ComplexityBreakdown, ComplexityWeights};

/// Id of the synthetic aggregation task.
pub const SUMMARY_TASK_ID: &str = "final_summary";

/// Metadata flag marking a task whose prompt has already been generated.
/// Re-processing a flagged task is a no-op, which makes the rewrite
/// idempotent.
pub const PROCESSED_FLAG: &str = "meta_agent_processed";

/// Meta-level prompt generator.
#[derive(Debug, Clone, Default)]
pub struct MetaAgent {
    analyzer: ComplexityAnalyzer,
    library: PromptTemplateLibrary,
    logger: Logger,
}

impl MetaAgent {
    /// Create a MetaAgent with default scoring and templates.
    pub fn new(verbose: bool) -> Self {
        Self {
            analyzer: ComplexityAnalyzer::default(),
            library: PromptTemplateLibrary::new(),
            logger: Logger::new(verbose),
        }
    }

    /// Create a MetaAgent with a custom analyzer.
    pub fn with_analyzer(analyzer: ComplexityAnalyzer, verbose: bool) -> Self {
        Self {
            analyzer,
            library: PromptTemplateLibrary::new(),
            logger: Logger::new(verbose),
        }
    }

    /// Rewrite every task's prompt and, when requested, append the summary
    /// task. The auto-generated input mapping for the summary task is added
    /// to `input_mappings`.
    ///
    /// Tasks already carrying the processed flag pass through unchanged.
    pub fn process_tasks(
        &self,
        tasks: Vec<Task>,
        input_mappings: &mut InputMappings,
        add_summary: bool,
    ) -> Vec<Task> {
        self.logger
            .info(&format!("meta agent: processing {} tasks", tasks.len()));

        let mut processed: Vec<Task> = Vec::with_capacity(tasks.len() + 1);
        for mut task in tasks {
            if task.metadata_flag(PROCESSED_FLAG) {
                processed.push(task);
                continue;
            }

            let analysis = self.analyzer.analyze(&task);
            self.logger.info(&format!(
                "  {}: {} (score: {})",
                task.id, analysis.template, analysis.score
            ));
            log::debug!("task {}: {}", task.id, analysis.reasoning);

            let generated = self.generate_prompt(&task, &analysis, input_mappings);
            mark_processed(&mut task, &analysis, generated);
            processed.push(task);
        }

        let already_has_summary = processed.iter().any(|t| t.id == SUMMARY_TASK_ID);
        if add_summary && processed.len() > 1 && !already_has_summary {
            let summary = self.create_summary_task(&processed, input_mappings);
            self.logger
                .info(&format!("  added summary task: {}", summary.id));
            processed.push(summary);
        }

        processed
    }

    /// Render the template selected for one task.
    fn generate_prompt(
        &self,
        task: &Task,
        analysis: &ComplexityAnalysis,
        input_mappings: &InputMappings,
    ) -> String {
        let mut variables = HashMap::from([("description", task.prompt.clone())]);
        if analysis.template == TemplateKind::Complex {
            variables.insert(
                "upstream_context",
                upstream_context_placeholder(task, input_mappings.get(&task.id)),
            );
        }

        match self.library.render(analysis.template, &variables) {
            Ok(prompt) => prompt,
            Err(e) => {
                // Cannot fail: every required variable is supplied above.
                log::error!("task {}: template render failed: {}", task.id, e);
                task.prompt.clone()
            }
        }
    }

    /// Build the synthetic summary task and its auto-generated input mapping.
    ///
    /// It depends on every leaf task (ids that appear in no other task's
    /// `depends_on`) and references each leaf's final answer.
    fn create_summary_task(&self, tasks: &[Task], input_mappings: &mut InputMappings) -> Task {
        let leaves = leaf_ids(tasks);

        let mut mapping = InputMapping::new();
        for leaf in &leaves {
            mapping.insert(format!("{}_result", leaf), format!("{}.final_answer", leaf));
        }

        let lines: Vec<String> = mapping
            .iter()
            .map(|(param, expr)| format!("- {}: {{{}}} (from {})", param, param, expr))
            .collect();
        let variables = HashMap::from([("all_task_results", lines.join("\n"))]);
        let prompt = match self.library.render(TemplateKind::Summary, &variables) {
            Ok(prompt) => prompt,
            Err(e) => {
                log::error!("summary template render failed: {}", e);
                String::new()
            }
        };

        input_mappings.insert(SUMMARY_TASK_ID.to_string(), mapping);

        let mut task = Task::with_dependencies(SUMMARY_TASK_ID, prompt, leaves)
            .with_type(TaskType::Summary);
        task.metadata
            .insert("is_summary".to_string(), serde_json::Value::Bool(true));
        task.metadata
            .insert(PROCESSED_FLAG.to_string(), serde_json::Value::Bool(true));
        task.metadata.insert(
            "template_used".to_string(),
            serde_json::Value::String(TemplateKind::Summary.to_string()),
        );
        task
    }
}

/// Ids that appear in no task's `depends_on`, sorted for determinism.
pub fn leaf_ids(tasks: &[Task]) -> Vec<String> {
    let mut leaves: Vec<String> = tasks
        .iter()
        .filter(|task| {
            tasks
                .iter()
                .all(|other| !other.depends_on.contains(&task.id))
        })
        .map(|task| task.id.clone())
        .collect();
    leaves.sort();
    leaves
}

fn mark_processed(task: &mut Task, analysis: &ComplexityAnalysis, generated: String) {
    task.metadata.insert(
        "original_prompt".to_string(),
        serde_json::Value::String(task.prompt.clone()),
    );
    task.metadata
        .insert(PROCESSED_FLAG.to_string(), serde_json::Value::Bool(true));
    task.metadata.insert(
        "complexity_score".to_string(),
        serde_json::Value::from(analysis.score),
    );
    task.metadata.insert(
        "template_used".to_string(),
        serde_json::Value::String(analysis.template.to_string()),
    );
    task.prompt = generated;
}

/// Placeholder text for the complex template's context section. The actual
/// data lands at injection time; this provides the structure.
fn upstream_context_placeholder(task: &Task, mapping: Option<&InputMapping>) -> String {
    if task.depends_on.is_empty() {
        return "No upstream context available".to_string();
    }
    match mapping {
        Some(mapping) if !mapping.is_empty() => mapping
            .iter()
            .map(|(param, expr)| format!("- {}: {{{}}} (from {})", param, param, expr))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => format!("Dependencies: {}", task.depends_on.join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tasks() -> Vec<Task> {
        vec![
            Task::new("task1", "List all users in /etc/passwd"),
            Task::with_dependencies(
                "task2",
                "Count files in the first user's home directory and calculate the total",
                vec!["task1".to_string()],
            ),
            Task::new("task3", "SELECT product_id FROM products WHERE sales > 1000")
                .with_type(TaskType::Database),
        ]
    }

    #[test]
    fn test_simple_task_gets_simple_template() {
        let meta = MetaAgent::new(false);
        let mut mappings = InputMappings::new();
        let tasks = meta.process_tasks(vec![Task::new("t1", "echo hi")], &mut mappings, false);
        assert!(tasks[0].prompt.starts_with("echo hi"));
        assert!(tasks[0].prompt.contains("FINAL_ANSWER:"));
        assert!(!tasks[0].prompt.contains("CONTEXT FROM UPSTREAM TASKS:"));
        assert!(tasks[0].metadata_flag(PROCESSED_FLAG));
    }

    #[test]
    fn test_complex_task_gets_context_section() {
        let meta = MetaAgent::new(false);
        let mut mappings = InputMappings::from([(
            "task2".to_string(),
            InputMapping::from([(
                "target_user".to_string(),
                "task1.users[0]".to_string(),
            )]),
        )]);
        let tasks = meta.process_tasks(sample_tasks(), &mut mappings, false);

        let task2 = tasks.iter().find(|t| t.id == "task2").unwrap();
        assert!(task2.prompt.contains("CONTEXT FROM UPSTREAM TASKS:"));
        assert!(task2
            .prompt
            .contains("- target_user: {target_user} (from task1.users[0])"));
    }

    #[test]
    fn test_database_root_task_has_no_upstream_context() {
        let meta = MetaAgent::new(false);
        let mut mappings = InputMappings::new();
        let tasks = meta.process_tasks(sample_tasks(), &mut mappings, false);
        let task3 = tasks.iter().find(|t| t.id == "task3").unwrap();
        assert!(task3.prompt.contains("No upstream context available"));
    }

    #[test]
    fn test_summary_task_depends_on_leaves() {
        let meta = MetaAgent::new(false);
        let mut mappings = InputMappings::new();
        let tasks = meta.process_tasks(sample_tasks(), &mut mappings, true);

        let summary = tasks.iter().find(|t| t.id == SUMMARY_TASK_ID).unwrap();
        // task1 feeds task2, so the leaves are task2 and task3.
        assert_eq!(summary.depends_on, vec!["task2", "task3"]);
        assert_eq!(summary.task_type, TaskType::Summary);
        assert!(summary.metadata_flag("is_summary"));

        let mapping = &mappings[SUMMARY_TASK_ID];
        assert_eq!(mapping["task2_result"], "task2.final_answer");
        assert_eq!(mapping["task3_result"], "task3.final_answer");
        assert!(summary.prompt.contains("{task2_result}"));
    }

    #[test]
    fn test_no_summary_for_single_task() {
        let meta = MetaAgent::new(false);
        let mut mappings = InputMappings::new();
        let tasks = meta.process_tasks(vec![Task::new("only", "echo")], &mut mappings, true);
        assert_eq!(tasks.len(), 1);
        assert!(!mappings.contains_key(SUMMARY_TASK_ID));
    }

    #[test]
    fn test_processing_is_idempotent() {
        let meta = MetaAgent::new(false);
        let mut mappings = InputMappings::new();
        let once = meta.process_tasks(sample_tasks(), &mut mappings, true);
        let prompts: Vec<String> = once.iter().map(|t| t.prompt.clone()).collect();

        let twice = meta.process_tasks(once, &mut mappings, true);
        assert_eq!(twice.len(), prompts.len());
        for (task, prompt) in twice.iter().zip(&prompts) {
            assert_eq!(&task.prompt, prompt);
        }
        // Only one summary task, ever.
        assert_eq!(twice.iter().filter(|t| t.id == SUMMARY_TASK_ID).count(), 1);
    }

    #[test]
    fn test_leaf_ids() {
        let tasks = vec![
            Task::new("a", "p"),
            Task::with_dependencies("b", "p", vec!["a".to_string()]),
            Task::with_dependencies("c", "p", vec!["a".to_string()]),
        ];
        assert_eq!(leaf_ids(&tasks), vec!["b", "c"]);
    }
}
