//! Rule-based task complexity scoring.
//!
//! Four criteria produce a score in [0, 100]; at or above the threshold the
//! task is classified complex and gets the complex template.

use serde::{Deserialize, Serialize};

use super::templates::TemplateKind;
use crate::task::{Task, TaskType};

/// Keywords whose presence marks a prompt as complex. Matching is
/// case-insensitive.
pub const COMPLEX_KEYWORDS: &[&str] = &[
    "database",
    "SELECT",
    "INSERT",
    "UPDATE",
    "DELETE",
    "query",
    "transaction",
    "join",
    "aggregate",
    "analyze",
    "calculate",
    "process",
    "transform",
];

/// Prompt length above which the full length weight applies.
const PROMPT_LENGTH_FULL: usize = 150;
/// Prompt length above which half the length weight applies.
const PROMPT_LENGTH_HALF: usize = 100;

/// Weights for the scoring criteria.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ComplexityWeights {
    /// Applied in full when the task has any dependencies.
    pub dependency_count: u32,
    /// Applied in full for `database` tasks.
    pub task_type: u32,
    /// Applied in full above 150 chars, in half above 100.
    pub prompt_length: u32,
    /// Applied in full when any complex keyword appears.
    pub keywords: u32,
}

impl Default for ComplexityWeights {
    fn default() -> Self {
        Self {
            dependency_count: 25,
            task_type: 30,
            prompt_length: 20,
            keywords: 25,
        }
    }
}

/// Per-criterion score breakdown.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComplexityBreakdown {
    pub dependency_count: u32,
    pub task_type: u32,
    pub prompt_length: u32,
    pub keywords: u32,
    /// Keywords found in the prompt, sorted for stable output.
    pub found_keywords: Vec<String>,
}

/// Result of scoring one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexityAnalysis {
    /// Total score in [0, 100].
    pub score: u32,
    /// Whether the score reached the threshold.
    pub complex: bool,
    /// Template recommended for the task.
    pub template: TemplateKind,
    /// Human-readable explanation of the decision.
    pub reasoning: String,
    /// Individual criterion scores.
    pub breakdown: ComplexityBreakdown,
}

/// Rule-based task complexity analyzer.
#[derive(Debug, Clone)]
pub struct ComplexityAnalyzer {
    threshold: u32,
    weights: ComplexityWeights,
}

impl Default for ComplexityAnalyzer {
    fn default() -> Self {
        Self::new(30, ComplexityWeights::default())
    }
}

impl ComplexityAnalyzer {
    /// Create an analyzer with a custom threshold and weights.
    pub fn new(threshold: u32, weights: ComplexityWeights) -> Self {
        Self { threshold, weights }
    }

    /// Score one task.
    pub fn analyze(&self, task: &Task) -> ComplexityAnalysis {
        let mut breakdown = ComplexityBreakdown {
            found_keywords: find_keywords(&task.prompt),
            ..Default::default()
        };

        if !task.depends_on.is_empty() {
            breakdown.dependency_count = self.weights.dependency_count;
        }
        if task.task_type == TaskType::Database {
            breakdown.task_type = self.weights.task_type;
        }
        let length = task.prompt.chars().count();
        breakdown.prompt_length = if length > PROMPT_LENGTH_FULL {
            self.weights.prompt_length
        } else if length > PROMPT_LENGTH_HALF {
            self.weights.prompt_length / 2
        } else {
            0
        };
        if !breakdown.found_keywords.is_empty() {
            breakdown.keywords = self.weights.keywords;
        }

        let score = breakdown.dependency_count
            + breakdown.task_type
            + breakdown.prompt_length
            + breakdown.keywords;
        let complex = score >= self.threshold;
        let template = if complex {
            TemplateKind::Complex
        } else {
            TemplateKind::Simple
        };
        let reasoning = build_reasoning(task, score, complex, &breakdown, length);

        ComplexityAnalysis {
            score,
            complex,
            template,
            reasoning,
            breakdown,
        }
    }
}

fn find_keywords(prompt: &str) -> Vec<String> {
    let lowered = prompt.to_lowercase();
    let mut found: Vec<String> = COMPLEX_KEYWORDS
        .iter()
        .filter(|keyword| lowered.contains(&keyword.to_lowercase()))
        .map(|keyword| keyword.to_string())
        .collect();
    found.sort();
    found
}

fn build_reasoning(
    task: &Task,
    score: u32,
    complex: bool,
    breakdown: &ComplexityBreakdown,
    length: usize,
) -> String {
    let mut reasons = Vec::new();
    if breakdown.dependency_count > 0 {
        reasons.push(format!("has {} dependencies", task.depends_on.len()));
    }
    if breakdown.task_type > 0 {
        reasons.push("database query task".to_string());
    }
    if breakdown.prompt_length > 0 {
        reasons.push(format!("long prompt ({} chars)", length));
    }
    if !breakdown.found_keywords.is_empty() {
        let preview: Vec<&str> = breakdown
            .found_keywords
            .iter()
            .take(3)
            .map(String::as_str)
            .collect();
        reasons.push(format!("contains complex keywords: {}", preview.join(", ")));
    }
    if reasons.is_empty() {
        reasons.push("simple task with no complexity indicators".to_string());
    }

    let label = if complex { "complex" } else { "simple" };
    format!(
        "Classified as '{}' (score: {}/100). Reasons: {}.",
        label,
        score,
        reasons.join(", ")
    )
}
