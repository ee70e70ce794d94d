//! Prompt templates for tasks of varying complexity.
//!
//! Three templates, plain text substitution only. The complex template's
//! upstream-context section is filled at injection time; at template-render
//! time it carries stable placeholder lines.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Template selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    /// Straightforward tasks without dependencies.
    Simple,
    /// Tasks with upstream dependencies or heavy operations.
    Complex,
    /// Final result aggregation.
    Summary,
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateKind::Simple => write!(f, "simple"),
            TemplateKind::Complex => write!(f, "complex"),
            TemplateKind::Summary => write!(f, "summary"),
        }
    }
}

/// A required template variable was not supplied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing required variable '{var}' for {kind} template")]
pub struct MissingVariable {
    pub var: String,
    pub kind: TemplateKind,
}

const SIMPLE_TEMPLATE: &str = "{description}

CRITICAL INSTRUCTIONS:
1. Execute this task directly using available tools (shell, file operations, database).
2. Do NOT ask clarifying questions - this is an automated task.
3. Do NOT analyze or explain - just execute and provide the answer.
4. You MUST end your response with exactly: FINAL_ANSWER: [your answer]

Example response format:
[execution steps if needed]
FINAL_ANSWER: your_answer_here";

const COMPLEX_TEMPLATE: &str = "{description}

CONTEXT FROM UPSTREAM TASKS:
{upstream_context}

CRITICAL INSTRUCTIONS:
1. Use the provided context data from upstream tasks.
2. Execute this task directly using available tools.
3. Do NOT ask questions - all necessary data is provided above.
4. Do NOT analyze or explain unnecessarily.
5. You MUST end your response with exactly: FINAL_ANSWER: [your answer]

Example response format:
[execution steps if needed]
FINAL_ANSWER: your_answer_here";

const SUMMARY_TEMPLATE: &str = "You are the summary agent responsible for aggregating all task results.

TASK RESULTS TO SUMMARIZE:
{all_task_results}

YOUR TASK:
Provide a comprehensive summary that includes:
1. Key findings from each task.
2. Important data points and statistics.
3. Overall insights and conclusions.

CRITICAL INSTRUCTIONS:
- Aggregate the results above into a coherent summary.
- Do NOT execute any new tasks.
- You MUST end your response with exactly: FINAL_ANSWER: [your summary]";

/// Library of the three prompt templates.
#[derive(Debug, Clone, Default)]
pub struct PromptTemplateLibrary;

impl PromptTemplateLibrary {
    /// Create the library.
    pub fn new() -> Self {
        Self
    }

    /// The raw template text.
    pub fn template(&self, kind: TemplateKind) -> &'static str {
        match kind {
            TemplateKind::Simple => SIMPLE_TEMPLATE,
            TemplateKind::Complex => COMPLEX_TEMPLATE,
            TemplateKind::Summary => SUMMARY_TEMPLATE,
        }
    }

    /// Variables a template requires.
    pub fn required_variables(&self, kind: TemplateKind) -> &'static [&'static str] {
        match kind {
            TemplateKind::Simple => &["description"],
            TemplateKind::Complex => &["description", "upstream_context"],
            TemplateKind::Summary => &["all_task_results"],
        }
    }

    /// Render a template, substituting `{var}` placeholders.
    pub fn render(
        &self,
        kind: TemplateKind,
        variables: &HashMap<&str, String>,
    ) -> Result<String, MissingVariable> {
        for var in self.required_variables(kind) {
            if !variables.contains_key(var) {
                return Err(MissingVariable {
                    var: var.to_string(),
                    kind,
                });
            }
        }

        let mut text = self.template(kind).to_string();
        for (var, value) in variables {
            text = text.replace(&format!("{{{}}}", var), value);
        }
        Ok(text)
    }
}
