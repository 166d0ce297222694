//! Main answer content.

use serde_json::Value;

use crate::chain::{Alias, AliasChain, read_text};

/// Message-part arrays (`[{"type": "text", "text": "..."}]`) joined in order.
fn read_text_parts(value: &Value) -> Option<String> {
    let parts = value.as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    if text.trim().is_empty() { None } else { Some(text) }
}

const CONTENT_ALIASES: &[Alias<String>] = &[
    Alias::new("content", read_text),
    Alias::new("content", read_text_parts),
    Alias::new("answer", read_text),
    Alias::new("answer.content", read_text),
    Alias::new("answer.answer", read_text),
    Alias::new("response", read_text),
    Alias::new("message.content", read_text),
    Alias::new("message.content", read_text_parts),
    Alias::new("completion", read_text),
    Alias::new("choices.0.message.content", read_text),
    Alias::new("text", read_text),
    Alias::new("output", read_text),
];

/// Main content chain.
pub const CONTENT: AliasChain<String> = AliasChain::new("content", CONTENT_ALIASES);

/// Main content, if any alias matches.
pub fn extract_content(payload: &Value) -> Option<String> {
    CONTENT.extract(payload)
}

/// Pretty-printed dump of a whole payload: the last-resort content.
pub fn structural_dump(payload: &Value) -> String {
    serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string())
}

/// Whether a payload carries anything besides its `type` discriminator.
/// A bare `{"type": "done"}` is not worth dumping.
pub fn has_dumpable_fields(payload: &Value) -> bool {
    match payload {
        Value::Object(map) => map.keys().any(|k| k != "type"),
        Value::Null => false,
        _ => true,
    }
}
