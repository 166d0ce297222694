//! Ordered alias chains.
//!
//! An [`AliasChain`] is a fixed, priority-ordered list of `(path, reader)`
//! pairs. Extraction walks the list and returns the first alias whose path
//! is present *and* whose reader accepts the value's shape. A reader that
//! rejects a value simply hands over to the next alias, so extraction can
//! never fail loudly and always yields the same output for the same input.

use serde_json::Value;
use tracing::trace;

use answerflow_shared::path;

/// Reads a value of the expected shape, or rejects it with `None`.
pub type Reader<T> = fn(&Value) -> Option<T>;

/// One `(path, reader)` step of a chain.
pub struct Alias<T: 'static> {
    /// Dotted path into the payload (see [`answerflow_shared::path`]).
    pub path: &'static str,
    pub reader: Reader<T>,
}

impl<T> Alias<T> {
    pub const fn new(path: &'static str, reader: Reader<T>) -> Self {
        Self { path, reader }
    }
}

/// A named, ordered list of aliases for one extracted entity.
pub struct AliasChain<T: 'static> {
    /// Entity name for tracing.
    pub name: &'static str,
    pub aliases: &'static [Alias<T>],
}

impl<T> AliasChain<T> {
    pub const fn new(name: &'static str, aliases: &'static [Alias<T>]) -> Self {
        Self { name, aliases }
    }

    /// First alias that is present and readable.
    pub fn extract(&self, payload: &Value) -> Option<T> {
        self.extract_with_path(payload).map(|(_, value)| value)
    }

    /// Like [`extract`](Self::extract), also reporting which path won.
    fn extract_with_path(&self, payload: &Value) -> Option<(&'static str, T)> {
        for alias in self.aliases {
            let Some(raw) = path::lookup(payload, alias.path) else {
                continue;
            };
            if let Some(value) = (alias.reader)(raw) {
                trace!(entity = self.name, path = alias.path, "alias matched");
                return Some((alias.path, value));
            }
        }
        None
    }

    /// The paths in priority order.
    #[cfg(test)]
    fn paths(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.aliases.iter().map(|a| a.path)
    }
}

// ---------------------------------------------------------------------------
// Shared readers
// ---------------------------------------------------------------------------

/// A non-blank string, as-is.
pub fn read_text(value: &Value) -> Option<String> {
    value
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// A number, or a string that parses as one.
pub fn read_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// An identifier: a non-blank string or an integer, rendered as a string.
pub fn read_identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A string or a list of strings (objects contribute their `text` field).
/// Blank entries are dropped; `None` when nothing is left.
pub fn read_string_list(value: &Value) -> Option<Vec<String>> {
    let items: Vec<String> = match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Object(_) => path::lookup_str(item, "text").map(str::to_string),
                _ => None,
            })
            .collect(),
        _ => return None,
    };

    let items: Vec<String> = items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() { None } else { Some(items) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const GREETING_ALIASES: &[Alias<String>] = &[
        Alias::new("greeting", read_text),
        Alias::new("message.greeting", read_text),
    ];
    const GREETING: AliasChain<String> = AliasChain::new("greeting", GREETING_ALIASES);

    #[test]
    fn first_present_alias_wins() {
        let v = json!({"greeting": "hi", "message": {"greeting": "hello"}});
        assert_eq!(GREETING.extract(&v).as_deref(), Some("hi"));
    }

    #[test]
    fn wrong_shape_advances_to_next_alias() {
        let v = json!({"greeting": {"nested": true}, "message": {"greeting": "hello"}});
        assert_eq!(
            GREETING.extract_with_path(&v),
            Some(("message.greeting", "hello".to_string()))
        );
    }

    #[test]
    fn exhausted_chain_is_none() {
        assert_eq!(GREETING.extract(&json!({"other": 1})), None);
        assert_eq!(GREETING.extract(&json!("not even an object")), None);
    }

    #[test]
    fn paths_are_in_priority_order() {
        let paths: Vec<_> = GREETING.paths().collect();
        assert_eq!(paths, vec!["greeting", "message.greeting"]);
    }

    #[test]
    fn string_list_reader_shapes() {
        assert_eq!(read_string_list(&json!("one")), Some(vec!["one".into()]));
        assert_eq!(
            read_string_list(&json!(["a", {"text": "b"}, 3, " "])),
            Some(vec!["a".into(), "b".into()])
        );
        assert_eq!(read_string_list(&json!([])), None);
    }

    #[test]
    fn identifiers_accept_numbers() {
        assert_eq!(read_identifier(&json!(42)), Some("42".into()));
        assert_eq!(read_identifier(&json!(" doc-1 ")), Some("doc-1".into()));
        assert_eq!(read_identifier(&json!(true)), None);
    }
}
