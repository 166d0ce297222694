//! Dotted-path lookup into untyped JSON payloads.
//!
//! Paths look like `message.content` or `choices.0.delta.content`: object
//! keys separated by `.`, with numeric segments indexing arrays. A key that
//! itself contains a dot (e.g. `@search.score`) matches when it is present
//! verbatim at the top level.

use serde_json::Value;

/// Resolve `path` inside `value`. `null` counts as absent.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if let Some(direct) = value.get(path) {
        return present(direct);
    }

    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    present(current)
}

/// Resolve `path` and read it as a non-blank string.
pub fn lookup_str<'a>(value: &'a Value, path: &str) -> Option<&'a str> {
    lookup(value, path)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// True when `path` resolves to anything but `null`.
pub fn has(value: &Value, path: &str) -> bool {
    lookup(value, path).is_some()
}

fn present(value: &Value) -> Option<&Value> {
    if value.is_null() { None } else { Some(value) }
}
