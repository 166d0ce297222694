//! Supporting content: excerpts shown beside the answer.
//!
//! Backends deliver these as objects (`{title, content}` and friends), as
//! citation objects that happen to carry their passage, or as flat
//! `"filename: content"` strings under `data_points`.

use serde_json::Value;

use answerflow_shared::{SupportingContentItem, path};

use crate::chain::{Alias, AliasChain};

/// Longest prefix accepted as a file name in `"filename: content"`.
const MAX_TITLE_CHARS: usize = 200;

const TITLE_KEYS: &[&str] = &["title", "fileName", "file_name", "filename", "filepath", "sourcepage", "name"];
const SOURCE_KEYS: &[&str] = &["source", "fileName", "file_name", "filename", "filepath", "sourcepage", "url"];
const BODY_KEYS: &[&str] = &["content", "text", "chunk", "snippet", "excerpt"];

fn first_str<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| path::lookup_str(value, k))
}

/// Split `"filename: content"`. The left side must look like a name: short,
/// single-line and non-empty.
pub fn split_named(text: &str) -> Option<(&str, &str)> {
    let (left, right) = text.split_once(": ")?;
    let left = left.trim();
    let right = right.trim();
    if left.is_empty()
        || right.is_empty()
        || left.contains('\n')
        || left.chars().count() > MAX_TITLE_CHARS
    {
        return None;
    }
    Some((left, right))
}

fn from_string(text: &str, position: usize) -> Option<SupportingContentItem> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(match split_named(text) {
        Some((name, body)) => SupportingContentItem {
            title: name.to_string(),
            content: body.to_string(),
            source: Some(name.to_string()),
        },
        None => SupportingContentItem {
            title: format!("Source {}", position + 1),
            content: text.to_string(),
            source: None,
        },
    })
}

fn from_object(value: &Value, position: usize) -> Option<SupportingContentItem> {
    let content = first_str(value, BODY_KEYS)?.trim().to_string();
    let source = first_str(value, SOURCE_KEYS).map(str::to_string);
    let title = first_str(value, TITLE_KEYS)
        .map(str::to_string)
        .or_else(|| source.clone())
        .unwrap_or_else(|| format!("Source {}", position + 1));
    Some(SupportingContentItem {
        title,
        content,
        source,
    })
}

fn from_entry(value: &Value, position: usize) -> Option<SupportingContentItem> {
    match value {
        Value::String(s) => from_string(s, position),
        Value::Object(_) => from_object(value, position),
        _ => None,
    }
}

fn non_empty(items: Vec<SupportingContentItem>) -> Option<Vec<SupportingContentItem>> {
    if items.is_empty() { None } else { Some(items) }
}

/// Strings, objects, or an array mixing both.
fn read_items(value: &Value) -> Option<Vec<SupportingContentItem>> {
    match value {
        Value::Array(entries) => non_empty(
            entries
                .iter()
                .enumerate()
                .filter_map(|(i, e)| from_entry(e, i))
                .collect(),
        ),
        other => from_entry(other, 0).map(|item| vec![item]),
    }
}

/// Citation objects only; plain strings there are markers, not passages.
fn read_citation_items(value: &Value) -> Option<Vec<SupportingContentItem>> {
    match value {
        Value::Array(entries) => non_empty(
            entries
                .iter()
                .enumerate()
                .filter(|(_, e)| e.is_object())
                .filter_map(|(i, e)| from_object(e, i))
                .collect(),
        ),
        Value::Object(_) => from_object(value, 0).map(|item| vec![item]),
        _ => None,
    }
}

const SUPPORTING_ALIASES: &[Alias<Vec<SupportingContentItem>>] = &[
    Alias::new("supporting_content", read_items),
    Alias::new("supportingContent", read_items),
    Alias::new("citations", read_citation_items),
    Alias::new("citation", read_citation_items),
    Alias::new("context.data_points.text", read_items),
    Alias::new("choices.0.context.data_points.text", read_items),
    Alias::new("choices.0.delta.context.data_points.text", read_items),
    Alias::new("message.context.data_points.text", read_items),
    Alias::new("data_points.text", read_items),
    Alias::new("data_points", read_items),
    Alias::new("answer.supporting_content", read_items),
];

/// Supporting content chain.
pub const SUPPORTING: AliasChain<Vec<SupportingContentItem>> =
    AliasChain::new("supporting_content", SUPPORTING_ALIASES);

/// Supporting content items, in payload order. Empty when nothing matches.
pub fn extract_supporting(payload: &Value) -> Vec<SupportingContentItem> {
    SUPPORTING.extract(payload).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn data_points_split_on_filename() {
        let v = json!({"context": {"data_points": {"text": [
            "info1.txt: Employees get 20 days",
            "no separator here"
        ]}}});
        let items = extract_supporting(&v);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "info1.txt");
        assert_eq!(items[0].content, "Employees get 20 days");
        assert_eq!(items[0].source.as_deref(), Some("info1.txt"));
        assert_eq!(items[1].title, "Source 2");
        assert_eq!(items[1].source, None);
    }

    #[test]
    fn explicit_objects() {
        let v = json!({"type": "supporting_content", "supporting_content": [
            {"title": "Policy", "content": "Text", "source": "policy.pdf"}
        ]});
        let items = extract_supporting(&v);
        assert_eq!(
            items,
            vec![SupportingContentItem {
                title: "Policy".into(),
                content: "Text".into(),
                source: Some("policy.pdf".into()),
            }]
        );
    }

    #[test]
    fn citations_with_text_are_supporting() {
        let v = json!({"citations": [
            {"fileName": "a.pdf", "text": "quoted"},
            {"fileName": "b.pdf"}
        ]});
        let items = extract_supporting(&v);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "a.pdf");
        assert_eq!(items[0].source.as_deref(), Some("a.pdf"));
    }

    #[test]
    fn citation_strings_are_not_supporting() {
        let v = json!({"citations": ["a.pdf"], "data_points": ["b.pdf: body"]});
        let items = extract_supporting(&v);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "b.pdf");
    }

    #[test]
    fn long_or_multiline_prefix_is_not_a_name() {
        let long = format!("{}: tail", "x".repeat(MAX_TITLE_CHARS + 1));
        assert!(split_named(&long).is_none());
        assert!(split_named("line one\nline two: tail").is_none());
        assert_eq!(split_named("a.pdf: body"), Some(("a.pdf", "body")));
    }

    #[test]
    fn nothing_matches() {
        assert!(extract_supporting(&json!({"content": "hi"})).is_empty());
    }
}
