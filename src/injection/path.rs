//! Path expressions addressing values inside upstream task results.
//!
//! Grammar, kept deliberately small: `<task_id>(.<field> | [<index>] | [*])+`.
//! Indices are zero-based and may be negative (`-1` is the last element);
//! `[*]` expands to the entire array. Anything more expressive belongs in an
//! explicit upstream task.

use serde_json::Value;

use super::InjectionError;

/// One step of a path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Field lookup in an object.
    Field(String),
    /// Array index; negative values count from the end.
    Index(i64),
    /// The entire array.
    Wildcard,
}

/// A parsed path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpression {
    /// Upstream task the head token names.
    pub task_id: String,
    /// Steps applied to that task's result, in order. Never empty.
    pub segments: Vec<PathSegment>,
    /// The original expression text, kept for error messages.
    pub expr: String,
}

impl PathExpression {
    /// Parse an expression string.
    pub fn parse(expr: &str) -> Result<Self, InjectionError> {
        let invalid = |reason: &str| InjectionError::InvalidPath {
            expr: expr.to_string(),
            reason: reason.to_string(),
        };

        let head_end = expr
            .find(['.', '['])
            .ok_or_else(|| invalid("expected at least one '.field' or '[index]' segment"))?;
        let task_id = &expr[..head_end];
        if task_id.is_empty() {
            return Err(invalid("empty task id"));
        }

        let mut segments = Vec::new();
        let mut rest = &expr[head_end..];
        while !rest.is_empty() {
            if let Some(after_dot) = rest.strip_prefix('.') {
                let end = after_dot.find(['.', '[']).unwrap_or(after_dot.len());
                let field = &after_dot[..end];
                if field.is_empty() {
                    return Err(invalid("empty field name"));
                }
                if field.contains(']') {
                    return Err(invalid("unexpected ']' in field name"));
                }
                segments.push(PathSegment::Field(field.to_string()));
                rest = &after_dot[end..];
            } else if let Some(after_bracket) = rest.strip_prefix('[') {
                let close = after_bracket
                    .find(']')
                    .ok_or_else(|| invalid("unclosed '['"))?;
                let inner = &after_bracket[..close];
                if inner == "*" {
                    segments.push(PathSegment::Wildcard);
                } else {
                    let index: i64 = inner
                        .parse()
                        .map_err(|_| invalid("array index must be an integer or '*'"))?;
                    segments.push(PathSegment::Index(index));
                }
                rest = &after_bracket[close + 1..];
            } else {
                return Err(invalid("expected '.' or '[' between segments"));
            }
        }

        if segments.is_empty() {
            return Err(invalid("expected at least one '.field' or '[index]' segment"));
        }

        Ok(Self {
            task_id: task_id.to_string(),
            segments,
            expr: expr.to_string(),
        })
    }

    /// Apply one segment to a value.
    pub fn apply(&self, value: &Value, segment: &PathSegment) -> Result<Value, InjectionError> {
        match segment {
            PathSegment::Field(field) => match value {
                Value::Object(map) => map.get(field).cloned().ok_or_else(|| {
                    InjectionError::MissingField {
                        field: field.clone(),
                        expr: self.expr.clone(),
                    }
                }),
                other => Err(InjectionError::TypeMismatch {
                    expr: self.expr.clone(),
                    reason: format!("cannot read field '{}' of {}", field, kind_of(other)),
                }),
            },
            PathSegment::Index(index) => match value {
                Value::Array(items) => {
                    let len = items.len();
                    let normalized = if *index < 0 {
                        len as i64 + index
                    } else {
                        *index
                    };
                    if normalized < 0 || normalized as usize >= len {
                        return Err(InjectionError::IndexOutOfRange {
                            index: *index,
                            len,
                            expr: self.expr.clone(),
                        });
                    }
                    Ok(items[normalized as usize].clone())
                }
                other => Err(InjectionError::TypeMismatch {
                    expr: self.expr.clone(),
                    reason: format!("cannot index into {}", kind_of(other)),
                }),
            },
            PathSegment::Wildcard => match value {
                Value::Array(_) => Ok(value.clone()),
                other => Err(InjectionError::TypeMismatch {
                    expr: self.expr.clone(),
                    reason: format!("cannot expand '[*]' over {}", kind_of(other)),
                }),
            },
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
