//! Field-level extraction from one raw source-like object.
//!
//! Backends disagree on nearly every field name of a document reference, so
//! each [`SourceFields`] member has its own alias chain. The registry turns
//! the result into a [`answerflow_shared::Source`].

use serde_json::{Map, Value};
use url::Url;

use crate::chain::{Alias, AliasChain, read_identifier, read_number, read_string_list, read_text};

// ---------------------------------------------------------------------------
// Readers
// ---------------------------------------------------------------------------

fn read_object(value: &Value) -> Option<Map<String, Value>> {
    value.as_object().filter(|m| !m.is_empty()).cloned()
}

fn read_any(value: &Value) -> Option<Value> {
    match value {
        Value::String(s) if s.trim().is_empty() => None,
        other => Some(other.clone()),
    }
}

fn read_page(value: &Value) -> Option<u32> {
    read_number(value)
        .filter(|n| n.is_finite() && *n >= 0.0 && n.fract() == 0.0 && *n <= f64::from(u32::MAX))
        .map(|n| n as u32)
}

/// Excerpts, deduplicated with first-seen order kept.
fn read_excerpts(value: &Value) -> Option<Vec<String>> {
    let mut items = read_string_list(value)?;
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
    Some(items)
}

// ---------------------------------------------------------------------------
// Alias chains
// ---------------------------------------------------------------------------

const ID_ALIASES: &[Alias<String>] = &[
    Alias::new("id", read_identifier),
    Alias::new("documentId", read_identifier),
    Alias::new("document_id", read_identifier),
    Alias::new("docId", read_identifier),
    Alias::new("doc_id", read_identifier),
    Alias::new("fileId", read_identifier),
    Alias::new("file_id", read_identifier),
];

const FILE_NAME_ALIASES: &[Alias<String>] = &[
    Alias::new("fileName", read_text),
    Alias::new("file_name", read_text),
    Alias::new("filename", read_text),
    Alias::new("filepath", read_text),
    Alias::new("sourcefile", read_text),
    Alias::new("sourcepage", read_text),
    Alias::new("source", read_text),
    Alias::new("title", read_text),
    Alias::new("name", read_text),
];

const SCORE_ALIASES: &[Alias<f64>] = &[
    Alias::new("score", read_number),
    Alias::new("@search.score", read_number),
    Alias::new("searchScore", read_number),
    Alias::new("reranker_score", read_number),
    Alias::new("@search.reranker_score", read_number),
    Alias::new("relevance", read_number),
    Alias::new("confidence", read_number),
];

const EXCERPT_ALIASES: &[Alias<Vec<String>>] = &[
    Alias::new("excerpts", read_excerpts),
    Alias::new("excerpt", read_excerpts),
    Alias::new("text", read_excerpts),
    Alias::new("content", read_excerpts),
    Alias::new("chunks", read_excerpts),
    Alias::new("snippets", read_excerpts),
    Alias::new("snippet", read_excerpts),
    Alias::new("quote", read_excerpts),
];

const HIGHLIGHT_ALIASES: &[Alias<Vec<String>>] = &[
    Alias::new("highlights", read_excerpts),
    Alias::new("captions", read_excerpts),
    Alias::new("@search.captions", read_excerpts),
    Alias::new("highlight", read_excerpts),
];

const URL_ALIASES: &[Alias<String>] = &[
    Alias::new("url", read_text),
    Alias::new("uri", read_text),
    Alias::new("link", read_text),
    Alias::new("href", read_text),
    Alias::new("sourceUrl", read_text),
    Alias::new("source_url", read_text),
];

const METADATA_ALIASES: &[Alias<Map<String, Value>>] = &[
    Alias::new("metadata", read_object),
    Alias::new("meta", read_object),
];

const PAGE_IMAGE_ALIASES: &[Alias<Vec<String>>] = &[
    Alias::new("pageImages", read_string_list),
    Alias::new("page_images", read_string_list),
    Alias::new("images", read_string_list),
];

const XRAY_ALIASES: &[Alias<Value>] = &[
    Alias::new("xray", read_any),
    Alias::new("xRay", read_any),
    Alias::new("x_ray", read_any),
];

const PAGE_ALIASES: &[Alias<u32>] = &[
    Alias::new("page", read_page),
    Alias::new("pageNumber", read_page),
    Alias::new("page_number", read_page),
];

pub const SOURCE_ID: AliasChain<String> = AliasChain::new("source.id", ID_ALIASES);
pub const SOURCE_FILE_NAME: AliasChain<String> = AliasChain::new("source.fileName", FILE_NAME_ALIASES);
pub const SOURCE_SCORE: AliasChain<f64> = AliasChain::new("source.score", SCORE_ALIASES);
pub const SOURCE_EXCERPTS: AliasChain<Vec<String>> = AliasChain::new("source.excerpts", EXCERPT_ALIASES);
pub const SOURCE_HIGHLIGHTS: AliasChain<Vec<String>> =
    AliasChain::new("source.highlights", HIGHLIGHT_ALIASES);
pub const SOURCE_URL: AliasChain<String> = AliasChain::new("source.url", URL_ALIASES);
pub const SOURCE_METADATA: AliasChain<Map<String, Value>> =
    AliasChain::new("source.metadata", METADATA_ALIASES);
pub const SOURCE_PAGE_IMAGES: AliasChain<Vec<String>> =
    AliasChain::new("source.pageImages", PAGE_IMAGE_ALIASES);
pub const SOURCE_XRAY: AliasChain<Value> = AliasChain::new("source.xray", XRAY_ALIASES);
pub const SOURCE_PAGE: AliasChain<u32> = AliasChain::new("source.page", PAGE_ALIASES);

// ---------------------------------------------------------------------------
// SourceFields
// ---------------------------------------------------------------------------

/// Everything one raw object says about a document. Absent fields are
/// `None`/empty; nothing here is defaulted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceFields {
    /// Explicit id, when the payload carries one.
    pub id: Option<String>,
    pub file_name: Option<String>,
    pub score: Option<f64>,
    pub excerpts: Vec<String>,
    pub highlights: Vec<String>,
    pub url: Option<String>,
    pub metadata: Map<String, Value>,
    pub page_images: Vec<String>,
    /// Raw x-ray value; the registry normalizes encoded strings.
    pub xray: Option<Value>,
    /// Page the reference points at (citations only).
    pub page: Option<u32>,
}

impl SourceFields {
    /// Read every field of a raw source-like object. Non-objects yield the
    /// empty value.
    pub fn from_value(value: &Value) -> Self {
        if !value.is_object() {
            return Self::default();
        }

        let url = SOURCE_URL.extract(value);
        let file_name = SOURCE_FILE_NAME
            .extract(value)
            .or_else(|| url.as_deref().and_then(file_name_from_url));

        Self {
            id: SOURCE_ID.extract(value),
            file_name,
            score: SOURCE_SCORE.extract(value).filter(|s| s.is_finite()),
            excerpts: SOURCE_EXCERPTS.extract(value).unwrap_or_default(),
            highlights: SOURCE_HIGHLIGHTS.extract(value).unwrap_or_default(),
            url,
            metadata: SOURCE_METADATA.extract(value).unwrap_or_default(),
            page_images: SOURCE_PAGE_IMAGES.extract(value).unwrap_or_default(),
            xray: SOURCE_XRAY.extract(value),
            page: SOURCE_PAGE.extract(value),
        }
    }

    /// The id this object would be registered under, if it names itself.
    pub fn derived_id(&self) -> Option<&str> {
        self.id.as_deref().or(self.file_name.as_deref())
    }
}

/// Last non-empty path segment of a URL.
pub fn file_name_from_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    url.path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_camel_and_snake_aliases() {
        let fields = SourceFields::from_value(&json!({
            "documentId": 17,
            "file_name": "benefits.pdf",
            "@search.score": "0.82",
            "excerpts": ["A", "B", "A"],
            "captions": [{"text": "hl"}],
            "metadata": {"lang": "en"},
            "page_images": ["p1.png"],
            "pageNumber": 3
        }));
        assert_eq!(fields.id.as_deref(), Some("17"));
        assert_eq!(fields.file_name.as_deref(), Some("benefits.pdf"));
        assert_eq!(fields.score, Some(0.82));
        assert_eq!(fields.excerpts, vec!["A", "B"]);
        assert_eq!(fields.highlights, vec!["hl"]);
        assert_eq!(fields.metadata.get("lang"), Some(&json!("en")));
        assert_eq!(fields.page_images, vec!["p1.png"]);
        assert_eq!(fields.page, Some(3));
    }

    #[test]
    fn file_name_falls_back_to_url() {
        let fields = SourceFields::from_value(&json!({
            "url": "https://files.example.com/docs/handbook.pdf?sig=abc"
        }));
        assert_eq!(fields.file_name.as_deref(), Some("handbook.pdf"));
        assert_eq!(fields.derived_id(), Some("handbook.pdf"));
    }

    #[test]
    fn unparseable_url_gives_no_name() {
        assert_eq!(file_name_from_url("not a url"), None);
        assert_eq!(file_name_from_url("https://example.com/"), None);
    }

    #[test]
    fn id_wins_over_file_name() {
        let fields = SourceFields::from_value(&json!({"id": "doc-1", "fileName": "a.pdf"}));
        assert_eq!(fields.derived_id(), Some("doc-1"));
    }

    #[test]
    fn xray_kept_raw() {
        let fields = SourceFields::from_value(&json!({"xray": "{\"pages\":1}"}));
        assert_eq!(fields.xray, Some(json!("{\"pages\":1}")));
    }

    #[test]
    fn non_object_is_empty() {
        assert_eq!(SourceFields::from_value(&json!("a.pdf")), SourceFields::default());
    }
}
