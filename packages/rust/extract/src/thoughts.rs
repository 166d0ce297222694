//! Thought process (the backend's reasoning trace).

use serde_json::Value;

use answerflow_shared::path;

use crate::chain::{Alias, AliasChain};

/// Render one thought entry: a string, or a `{title, description}` step.
fn render_step(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim_end().to_string()),
        Value::Object(_) => {
            let title = path::lookup_str(value, "title");
            let description = path::lookup(value, "description").map(|d| match d {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });
            match (title, description) {
                (Some(t), Some(d)) => Some(format!("{t}: {d}")),
                (Some(t), None) => Some(t.to_string()),
                (None, Some(d)) => Some(d),
                (None, None) => None,
            }
        }
        _ => None,
    }
}

/// A string, or an array of steps joined one per line.
fn read_thoughts(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(render_step)
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        _ => return None,
    };
    if text.trim().is_empty() { None } else { Some(text) }
}

const THOUGHT_ALIASES: &[Alias<String>] = &[
    Alias::new("thought_process", read_thoughts),
    Alias::new("thoughtProcess", read_thoughts),
    Alias::new("thoughts", read_thoughts),
    Alias::new("result.thoughts", read_thoughts),
    Alias::new("metadata.reasoning", read_thoughts),
    Alias::new("systemMessage", read_thoughts),
    Alias::new("reasoning", read_thoughts),
    Alias::new("context.thoughts", read_thoughts),
    Alias::new("choices.0.context.thoughts", read_thoughts),
    Alias::new("choices.0.delta.context.thoughts", read_thoughts),
    Alias::new("message.context.thoughts", read_thoughts),
    Alias::new("answer.thoughts", read_thoughts),
    Alias::new("thinking", read_thoughts),
];

/// Thought process chain.
pub const THOUGHTS: AliasChain<String> = AliasChain::new("thought_process", THOUGHT_ALIASES);

/// Thought process text, if any alias matches.
pub fn extract_thoughts(payload: &Value) -> Option<String> {
    THOUGHTS.extract(payload)
}

const THOUGHT_RECORD_BODY: &[Alias<String>] = &[
    Alias::new("content", read_thoughts),
    Alias::new("text", read_thoughts),
    Alias::new("delta", read_thoughts),
];

const THOUGHT_RECORD: AliasChain<String> = AliasChain::new("thought_record", THOUGHT_RECORD_BODY);

/// Body of an explicit `thought_process` record. Such records often carry
/// their text under a generic key instead of a thought-specific one.
pub fn from_thought_record(payload: &Value) -> Option<String> {
    extract_thoughts(payload).or_else(|| THOUGHT_RECORD.extract(payload))
}
