//! Dependency injection: resolving upstream values and rewriting prompts.
//!
//! Given a downstream task, the results of its upstream tasks, and an input
//! mapping (parameter name -> path expression), the injector produces the
//! enhanced prompt the task actually receives. Substitution happens two ways
//! at once: named `{param}` placeholders are replaced in-line, and a
//! human-readable context block enumerates every binding for agents that do
//! not interpolate placeholders. Output is byte-identical for identical
//! inputs.

pub mod path;

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use crate::task::Task;
use crate::tasks::task_result::TaskResult;
use path::{PathExpression, PathSegment};

/// Parameter name -> path expression. Ordered so that substitution and the
/// context block are deterministic.
pub type InputMapping = BTreeMap<String, String>;

/// Per-task input mappings, keyed by task id.
pub type InputMappings = HashMap<String, InputMapping>;

/// Header line that introduces (and locates) the context block in a prompt.
pub const CONTEXT_HEADER: &str = "CONTEXT FROM UPSTREAM TASKS:";

/// A path expression could not be resolved against the upstream results.
///
/// Surfaces as a failed result for the *downstream* task; the message always
/// names the offending path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InjectionError {
    /// The expression text does not follow the path grammar.
    #[error("invalid path expression '{expr}': {reason}")]
    InvalidPath { expr: String, reason: String },

    /// The head token names a task absent from the upstream results.
    #[error("upstream task not found: '{task_id}' in path '{expr}'")]
    UnknownTask { task_id: String, expr: String },

    /// The upstream produced no structured data and re-parsing its final
    /// answer yielded none either (or strict mode forbade the re-parse).
    #[error("upstream task '{task_id}' has no structured data to resolve '{expr}'")]
    NoStructuredData { task_id: String, expr: String },

    /// A field lookup failed.
    #[error("missing field '{field}' while resolving '{expr}'")]
    MissingField { field: String, expr: String },

    /// An array index was out of range.
    #[error("index {index} out of range (length {len}) while resolving '{expr}'")]
    IndexOutOfRange { index: i64, len: usize, expr: String },

    /// A segment was applied to a value of the wrong shape.
    #[error("type mismatch while resolving '{expr}': {reason}")]
    TypeMismatch { expr: String, reason: String },
}

/// Injector behavior knobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct InjectorOptions {
    /// When an upstream's `parsed_data` is empty, the injector normally falls
    /// back to a best-effort JSON re-parse of its `final_answer`. Setting
    /// this forbids the fallback and fails instead.
    pub strict_reparse: bool,
}

/// Resolves path expressions and rewrites prompts. Pure: no timestamps, no
/// randomness, no caching.
#[derive(Debug, Clone, Default)]
pub struct DependencyInjector {
    options: InjectorOptions,
}

impl DependencyInjector {
    /// Create an injector with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an injector with explicit options.
    pub fn with_options(options: InjectorOptions) -> Self {
        Self { options }
    }

    /// Produce the enhanced prompt for `task`, failing on the first
    /// unresolvable path.
    pub fn inject(
        &self,
        task: &Task,
        upstream_results: &HashMap<String, TaskResult>,
        mapping: &InputMapping,
    ) -> Result<String, InjectionError> {
        let mut bindings = Vec::with_capacity(mapping.len());
        for (param, expr) in mapping {
            let value = self.resolve(expr, upstream_results)?;
            bindings.push((param.clone(), expr.clone(), value));
        }
        Ok(rewrite_prompt(&task.prompt, &bindings))
    }

    /// Produce the enhanced prompt, substituting `null` for unresolvable
    /// paths and recording one warning per substitution. Used by the
    /// `continue_partial` failure policy.
    pub fn inject_lenient(
        &self,
        task: &Task,
        upstream_results: &HashMap<String, TaskResult>,
        mapping: &InputMapping,
    ) -> (String, Vec<String>) {
        let mut bindings = Vec::with_capacity(mapping.len());
        let mut warnings = Vec::new();
        for (param, expr) in mapping {
            let value = match self.resolve(expr, upstream_results) {
                Ok(value) => value,
                Err(e) => {
                    warnings.push(format!("task '{}', param '{}': {}", task.id, param, e));
                    Value::Null
                }
            };
            bindings.push((param.clone(), expr.clone(), value));
        }
        (rewrite_prompt(&task.prompt, &bindings), warnings)
    }

    /// Resolve a single path expression against the upstream results.
    pub fn resolve(
        &self,
        expr: &str,
        upstream_results: &HashMap<String, TaskResult>,
    ) -> Result<Value, InjectionError> {
        let path = PathExpression::parse(expr)?;
        let result =
            upstream_results
                .get(&path.task_id)
                .ok_or_else(|| InjectionError::UnknownTask {
                    task_id: path.task_id.clone(),
                    expr: path.expr.clone(),
                })?;

        // The first segment is looked up in the result's namespaces:
        // `final_answer` and `output` are addressable directly and never
        // shadowed by `parsed_data` keys.
        let mut segments = path.segments.iter();
        let first = segments.next().expect("parser guarantees one segment");
        let mut current = match first {
            PathSegment::Field(field) if field == "final_answer" => {
                Value::String(result.final_answer.clone())
            }
            PathSegment::Field(field) if field == "output" => {
                Value::String(result.output.clone())
            }
            PathSegment::Field(field) => {
                let root = self.structured_root(result, &path)?;
                path.apply(&root, &PathSegment::Field(field.clone()))?
            }
            other => {
                // `task_id[0]` style: index straight into the structured root.
                let root = self.structured_root(result, &path)?;
                path.apply(&root, other)?
            }
        };

        for segment in segments {
            current = path.apply(&current, segment)?;
        }
        Ok(current)
    }

    /// The structured value a task's fields are resolved against:
    /// `parsed_data` when present, otherwise a best-effort JSON re-parse of
    /// `final_answer` (unless strict mode forbids it).
    fn structured_root(
        &self,
        result: &TaskResult,
        path: &PathExpression,
    ) -> Result<Value, InjectionError> {
        if !result.parsed_data.is_empty() {
            return Ok(Value::Object(
                result
                    .parsed_data
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ));
        }

        let no_data = || InjectionError::NoStructuredData {
            task_id: path.task_id.clone(),
            expr: path.expr.clone(),
        };
        if self.options.strict_reparse {
            return Err(no_data());
        }
        match serde_json::from_str::<Value>(result.final_answer.trim()) {
            Ok(value @ Value::Object(_)) => Ok(value),
            _ => Err(no_data()),
        }
    }
}

/// Serialize a resolved value for substitution: compact JSON, so strings keep
/// their double quotes and numbers/bools stay bare.
pub fn render_value(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// Replace `{param}` placeholders and attach the context block.
///
/// When the prompt already carries the context header (complex-template
/// prompts pre-seed it with placeholder lines), in-line substitution fills
/// that section and no second block is added; otherwise the block is
/// prepended. Re-injecting an already injected prompt is a no-op.
fn rewrite_prompt(prompt: &str, bindings: &[(String, String, Value)]) -> String {
    let mut rewritten = prompt.to_string();
    for (param, _, value) in bindings {
        let placeholder = format!("{{{}}}", param);
        rewritten = rewritten.replace(&placeholder, &render_value(value));
    }

    if bindings.is_empty() || rewritten.contains(CONTEXT_HEADER) {
        return rewritten;
    }

    let mut block = String::from(CONTEXT_HEADER);
    for (param, expr, value) in bindings {
        block.push_str(&format!("\n- {}: {} (from {})", param, render_value(value), expr));
    }
    format!("{}\n\n{}", block, rewritten)
}
