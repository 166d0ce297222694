//! Core domain types for the canonical answer model.
//!
//! Everything a renderer consumes lives here: [`Answer`] and the entities it
//! aggregates ([`Source`], [`Citation`], [`SupportingContentItem`]). Types
//! serialize as camelCase JSON so snapshots read like the payloads they were
//! built from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Number of leading content characters that take part in the supporting
/// content dedup key.
pub const SUPPORTING_KEY_CHARS: usize = 50;

// ---------------------------------------------------------------------------
// TurnId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for chat turn identifiers (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnId(pub Uuid);

impl TurnId {
    /// Generate a new time-sortable turn identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TurnId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Metadata about a chat turn, kept alongside its answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnMeta {
    pub id: TurnId,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// A document referenced by an answer.
///
/// Sources are created provisionally on first reference and filled in by
/// later payloads; see the registry for the merge rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Stable id, unique within one turn's registry.
    pub id: String,
    /// Display file name. Empty until some payload provides one.
    #[serde(default)]
    pub file_name: String,
    /// Retrieval score, when the backend reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Quoted passages, deduplicated, first-seen order.
    #[serde(default)]
    pub excerpts: Vec<String>,
    /// Highlighted fragments (captions) from the search backend.
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Free-form backend metadata.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Page image references (URLs or blob names).
    #[serde(default)]
    pub page_images: Vec<String>,
    /// Structured document analysis ("x-ray"), normalized to JSON when
    /// possible, otherwise kept as the original string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xray: Option<Value>,
}

impl Source {
    /// An empty source carrying only its id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            file_name: String::new(),
            score: None,
            excerpts: Vec::new(),
            highlights: Vec::new(),
            url: None,
            metadata: Map::new(),
            page_images: Vec::new(),
            xray: None,
        }
    }

    /// The file name, or the id when no name has arrived yet.
    pub fn display_name(&self) -> &str {
        if self.file_name.is_empty() {
            &self.id
        } else {
            &self.file_name
        }
    }
}

// ---------------------------------------------------------------------------
// Citation
// ---------------------------------------------------------------------------

/// A numbered reference from the answer text to a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    /// Source id when resolved, raw marker text otherwise.
    pub id: String,
    pub file_name: String,
    /// 1-based, contiguous, never renumbered within a turn.
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_source_id: Option<String>,
}

impl Citation {
    /// Whether this citation points at a registry source.
    pub fn is_resolved(&self) -> bool {
        self.resolved_source_id.is_some()
    }
}

// ---------------------------------------------------------------------------
// SupportingContentItem
// ---------------------------------------------------------------------------

/// An excerpt surfaced next to the answer to substantiate it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportingContentItem {
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl SupportingContentItem {
    /// Dedup key: title plus the first 50 characters of content.
    pub fn dedup_key(&self) -> (String, String) {
        let prefix: String = self.content.chars().take(SUPPORTING_KEY_CHARS).collect();
        (self.title.clone(), prefix)
    }
}

// ---------------------------------------------------------------------------
// Answer
// ---------------------------------------------------------------------------

/// Lifecycle of one turn's answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerState {
    /// Nothing received yet.
    #[default]
    Empty,
    /// Chunks are arriving.
    Streaming,
    /// A terminal record or caller finalize froze the answer.
    Finalized,
    /// The caller gave up on the stream; content is kept as last applied.
    Aborted,
}

impl AnswerState {
    /// Stable lowercase name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Streaming => "streaming",
            Self::Finalized => "finalized",
            Self::Aborted => "aborted",
        }
    }

    /// True once no more records will be applied.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized | Self::Aborted)
    }
}

/// The canonical, renderer-agnostic answer for one chat turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub content: String,
    #[serde(default)]
    pub thought_process: String,
    #[serde(default)]
    pub supporting_content: Vec<SupportingContentItem>,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub followup_questions: Vec<String>,
    #[serde(default)]
    pub is_streaming: bool,
}

impl Answer {
    /// Copy of this answer with every backend-produced string passed through
    /// `sanitizer`. Ids, indices, and URLs are left alone.
    pub fn sanitized(&self, sanitizer: &dyn Sanitizer) -> Answer {
        Answer {
            content: sanitizer.sanitize(&self.content),
            thought_process: sanitizer.sanitize(&self.thought_process),
            supporting_content: self
                .supporting_content
                .iter()
                .map(|item| SupportingContentItem {
                    title: sanitizer.sanitize(&item.title),
                    content: sanitizer.sanitize(&item.content),
                    source: item.source.clone(),
                })
                .collect(),
            citations: self
                .citations
                .iter()
                .map(|c| Citation {
                    file_name: sanitizer.sanitize(&c.file_name),
                    ..c.clone()
                })
                .collect(),
            sources: self
                .sources
                .iter()
                .map(|s| Source {
                    file_name: sanitizer.sanitize(&s.file_name),
                    excerpts: s.excerpts.iter().map(|e| sanitizer.sanitize(e)).collect(),
                    highlights: s.highlights.iter().map(|h| sanitizer.sanitize(h)).collect(),
                    ..s.clone()
                })
                .collect(),
            followup_questions: self
                .followup_questions
                .iter()
                .map(|q| sanitizer.sanitize(q))
                .collect(),
            is_streaming: self.is_streaming,
        }
    }
}

// ---------------------------------------------------------------------------
// Sanitizer seam
// ---------------------------------------------------------------------------

/// Render-boundary escaping, implemented outside this workspace.
pub trait Sanitizer {
    /// Return a version of `raw` that is safe for the target renderer.
    fn sanitize(&self, raw: &str) -> String;
}

impl<F> Sanitizer for F
where
    F: Fn(&str) -> String,
{
    fn sanitize(&self, raw: &str) -> String {
        self(raw)
    }
}
