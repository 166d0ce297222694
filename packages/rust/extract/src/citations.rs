//! Raw citation and source lists.
//!
//! Both chains yield the raw source-like objects untouched; turning them
//! into [`answerflow_shared::Source`] values is the registry's job (see
//! [`crate::sources::SourceFields`]).

use serde_json::{Value, json};

use crate::chain::{Alias, AliasChain};
use crate::sources::SourceFields;

/// A bare string names a file.
fn named(file_name: &str) -> Value {
    json!({ "fileName": file_name })
}

fn source_like(value: &Value) -> Option<Value> {
    match value {
        Value::Object(_) => Some(value.clone()),
        Value::String(s) if !s.trim().is_empty() => Some(named(s.trim())),
        _ => None,
    }
}

/// An object, a file-name string, or an array of either.
fn read_source_list(value: &Value) -> Option<Vec<Value>> {
    let items: Vec<Value> = match value {
        Value::Array(entries) => entries.iter().filter_map(source_like).collect(),
        other => source_like(other).into_iter().collect(),
    };
    if items.is_empty() { None } else { Some(items) }
}

/// Arrays only; a single object under a list key is usually something else.
fn read_source_array(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(_) => read_source_list(value),
        _ => None,
    }
}

const CITATION_ALIASES: &[Alias<Vec<Value>>] = &[
    Alias::new("citation", read_source_list),
    Alias::new("citations", read_source_list),
    Alias::new("answer.citations", read_source_list),
    Alias::new("context.citations", read_source_list),
    Alias::new("message.context.citations", read_source_list),
    Alias::new("choices.0.context.citations", read_source_list),
    Alias::new("choices.0.delta.context.citations", read_source_list),
];

/// Citation chain.
pub const CITATIONS: AliasChain<Vec<Value>> = AliasChain::new("citations", CITATION_ALIASES);

const SOURCE_ALIASES: &[Alias<Vec<Value>>] = &[
    Alias::new("sources", read_source_array),
    Alias::new("documents", read_source_array),
    Alias::new("answer.sources", read_source_array),
    Alias::new("answer.documents", read_source_array),
    Alias::new("context.sources", read_source_array),
    Alias::new("choices.0.context.sources", read_source_array),
    Alias::new("search_results", read_source_array),
];

/// Source-list chain.
pub const SOURCES: AliasChain<Vec<Value>> = AliasChain::new("sources", SOURCE_ALIASES);

/// Raw citation objects, payload order.
pub fn extract_citations(payload: &Value) -> Vec<Value> {
    CITATIONS.extract(payload).unwrap_or_default()
}

/// Raw source objects, payload order.
pub fn extract_sources(payload: &Value) -> Vec<Value> {
    SOURCES.extract(payload).unwrap_or_default()
}

/// Citations carried by an explicit `citation` record. Some backends put the
/// document fields on the record itself instead of under `citation`.
pub fn from_citation_record(payload: &Value) -> Vec<Value> {
    let nested = extract_citations(payload);
    if !nested.is_empty() {
        return nested;
    }
    let fields = SourceFields::from_value(payload);
    if fields.id.is_some() || fields.file_name.is_some() {
        vec![payload.clone()]
    } else {
        Vec::new()
    }
}
