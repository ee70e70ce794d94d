//! Transcript harvesting: cleanup, completion-marker search, and best-effort
//! structured extraction.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

/// The literal completion marker an agent must emit. Case-sensitive; the last
/// occurrence wins because agents sometimes discuss the marker before
/// emitting it.
pub const COMPLETION_MARKER: &str = "FINAL_ANSWER:";

static ANSI_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").expect("valid ANSI regex"));

/// Matches the marker at the start of the transcript, of a line, or after
/// whitespace, so prose like "emit FINAL_ANSWER" mid-word does not count.
static MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)FINAL_ANSWER:").expect("valid marker regex"));

static FENCED_JSON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("valid fence regex")
});

/// Decode raw child-process output: lossy UTF-8, ANSI escapes stripped, line
/// endings normalized to `\n`.
pub fn clean(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let stripped = ANSI_ESCAPE.replace_all(&text, "");
    stripped.replace("\r\n", "\n").replace('\r', "\n")
}

/// Extract the text after the last completion marker, trimmed. `None` when
/// the agent never signalled completion.
pub fn extract_final_answer(output: &str) -> Option<String> {
    let last = MARKER.find_iter(output).last()?;
    Some(output[last.end()..].trim().to_string())
}

/// Unwrap a CLI JSON envelope: when the whole transcript is a JSON object
/// carrying the actual text under `text` or `result`, return that text.
pub fn unwrap_envelope(output: &str) -> Option<String> {
    let value: Value = serde_json::from_str(output.trim()).ok()?;
    let object = value.as_object()?;
    for key in ["text", "result"] {
        if let Some(text) = object.get(key).and_then(Value::as_str) {
            return Some(text.to_string());
        }
    }
    None
}

/// Best-effort extraction of a structured payload from a transcript.
///
/// Tries, in order: the last fenced JSON block, then the widest `{..}` slice
/// of the transcript body. Only top-level objects qualify; anything else
/// yields an empty map, which the caller treats as "no structure requested
/// or discovered" rather than a failure.
pub fn extract_structured(output: &str) -> HashMap<String, Value> {
    // Search before the marker so the final answer itself is not re-parsed.
    let body = match MARKER.find_iter(output).last() {
        Some(m) => &output[..m.start()],
        None => output,
    };

    if let Some(captures) = FENCED_JSON.captures_iter(body).last() {
        if let Some(map) = parse_object(captures.get(1).map(|m| m.as_str()).unwrap_or_default()) {
            return map;
        }
    }

    if let (Some(start), Some(end)) = (body.find('{'), body.rfind('}')) {
        if start < end {
            if let Some(map) = parse_object(&body[start..=end]) {
                return map;
            }
            // The widest slice may span unrelated braces; retry on the
            // innermost balanced candidate from the end.
            if let Some(inner_start) = body[..end].rfind('{') {
                if let Some(map) = parse_object(&body[inner_start..=end]) {
                    return map;
                }
            }
        }
    }

    HashMap::new()
}

fn parse_object(candidate: &str) -> Option<HashMap<String, Value>> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Some(map.into_iter().collect()),
        _ => None,
    }
}
