//! Record classification.
//!
//! Every parsed JSON object is assigned exactly one [`RecordKind`]. An
//! explicit `type` discriminator wins when it maps through the fixed table;
//! otherwise the object's shape decides. Objects that fit nothing are kept as
//! [`Record::Unknown`] for diagnostics.

use serde_json::Value;
use tracing::trace;

use answerflow_shared::path;

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

/// Discriminant of a [`Record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Citation,
    SupportingContent,
    ThoughtProcess,
    Done,
    ContextUpdate,
    PlainDelta,
    Unknown,
}

impl RecordKind {
    /// Stable snake_case name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Citation => "citation",
            Self::SupportingContent => "supporting_content",
            Self::ThoughtProcess => "thought_process",
            Self::Done => "done",
            Self::ContextUpdate => "context_update",
            Self::PlainDelta => "plain_delta",
            Self::Unknown => "unknown",
        }
    }

    /// Map an explicit `type` tag through the fixed lookup table.
    pub fn from_type_tag(tag: &str) -> Option<Self> {
        match tag {
            "citation" => Some(Self::Citation),
            "supporting_content" | "supportingContent" => Some(Self::SupportingContent),
            "thought_process" | "thoughtProcess" => Some(Self::ThoughtProcess),
            "done" | "complete" => Some(Self::Done),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One classified unit of the stream.
///
/// Structured kinds carry the whole original object so extractors can walk
/// every alias path; [`Record::PlainDelta`] carries only its text.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Citation { payload: Value },
    SupportingContent { payload: Value },
    ThoughtProcess { payload: Value },
    /// Terminal record; `payload` may hold the final composite answer.
    Done { payload: Value },
    /// Nested context shape: thoughts, data points, sources, and an optional
    /// content delta.
    ContextUpdate { payload: Value },
    /// A bare text delta to append.
    PlainDelta { text: String },
    /// Retained but never surfaced.
    Unknown { payload: Value },
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Citation { .. } => RecordKind::Citation,
            Self::SupportingContent { .. } => RecordKind::SupportingContent,
            Self::ThoughtProcess { .. } => RecordKind::ThoughtProcess,
            Self::Done { .. } => RecordKind::Done,
            Self::ContextUpdate { .. } => RecordKind::ContextUpdate,
            Self::PlainDelta { .. } => RecordKind::PlainDelta,
            Self::Unknown { .. } => RecordKind::Unknown,
        }
    }

    /// The original object, for every kind except `PlainDelta`.
    pub fn payload(&self) -> Option<&Value> {
        match self {
            Self::Citation { payload }
            | Self::SupportingContent { payload }
            | Self::ThoughtProcess { payload }
            | Self::Done { payload }
            | Self::ContextUpdate { payload }
            | Self::Unknown { payload } => Some(payload),
            Self::PlainDelta { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Shape probes
// ---------------------------------------------------------------------------

/// Where a nested `context` object may sit.
const CONTEXT_PATHS: &[&str] = &[
    "context",
    "choices.0.context",
    "choices.0.delta.context",
    "message.context",
];

/// Where a bare text delta may sit, in priority order.
pub const DELTA_PATHS: &[&str] = &[
    "delta",
    "content",
    "delta.content",
    "delta.text",
    "choices.0.delta.content",
];

/// Top-level keys that mark a record as more than a plain delta.
const STRUCTURAL_KEYS: &[&str] = &[
    "context",
    "citation",
    "citations",
    "supporting_content",
    "supportingContent",
    "data_points",
    "thoughts",
    "thought_process",
    "thoughtProcess",
    "sources",
    "documents",
    "answer",
    "followup_questions",
    "followupQuestions",
];

/// Source collections that make a record a registry update on their own.
const SOURCE_LIST_KEYS: &[&str] = &["sources", "documents"];

fn has_context_update(value: &Value) -> bool {
    CONTEXT_PATHS.iter().any(|p| {
        path::lookup(value, p).is_some_and(|ctx| {
            path::has(ctx, "thoughts") || path::has(ctx, "data_points.text")
        })
    })
}

fn has_source_list(value: &Value) -> bool {
    SOURCE_LIST_KEYS
        .iter()
        .any(|k| value.get(*k).is_some_and(Value::is_array))
}

fn has_structural_markers(value: &Value) -> bool {
    STRUCTURAL_KEYS.iter().any(|k| path::has(value, k))
}

/// Read a delta string. Whitespace-only deltas are meaningful here.
pub fn delta_text(value: &Value) -> Option<&str> {
    DELTA_PATHS
        .iter()
        .find_map(|p| path::lookup(value, p).and_then(Value::as_str))
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Classify one parsed object. First match wins:
/// 1. `type` through the fixed table
/// 2. nested context with thoughts / data points, or a source list
/// 3. a text delta with no structural markers
/// 4. unknown
pub fn classify(value: Value) -> Record {
    let tagged = value
        .get("type")
        .and_then(Value::as_str)
        .and_then(RecordKind::from_type_tag);

    let record = match tagged {
        Some(RecordKind::Citation) => Record::Citation { payload: value },
        Some(RecordKind::SupportingContent) => Record::SupportingContent { payload: value },
        Some(RecordKind::ThoughtProcess) => Record::ThoughtProcess { payload: value },
        Some(RecordKind::Done) => Record::Done { payload: value },
        _ if has_context_update(&value) || has_source_list(&value) => {
            Record::ContextUpdate { payload: value }
        }
        _ if !has_structural_markers(&value) => match delta_text(&value) {
            Some(text) => Record::PlainDelta {
                text: text.to_string(),
            },
            None => Record::Unknown { payload: value },
        },
        _ => Record::Unknown { payload: value },
    };

    trace!(kind = record.kind().as_str(), "classified record");
    record
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn explicit_type_table() {
        let cases = [
            (json!({"type": "citation"}), RecordKind::Citation),
            (json!({"type": "supporting_content"}), RecordKind::SupportingContent),
            (json!({"type": "thought_process"}), RecordKind::ThoughtProcess),
            (json!({"type": "done"}), RecordKind::Done),
        ];
        for (value, expected) in cases {
            assert_eq!(classify(value).kind(), expected);
        }
    }

    #[test]
    fn type_wins_over_shape() {
        let record = classify(json!({"type": "done", "context": {"thoughts": "x"}}));
        assert_eq!(record.kind(), RecordKind::Done);
    }

    #[test]
    fn context_thoughts_is_context_update() {
        let record = classify(json!({"context": {"thoughts": ["step1", "step2"]}}));
        assert_eq!(record.kind(), RecordKind::ContextUpdate);
    }

    #[test]
    fn data_points_text_is_context_update() {
        let record = classify(json!({
            "choices": [{"delta": {"content": "Hi"}, "context": {"data_points": {"text": ["a.pdf: x"]}}}]
        }));
        assert_eq!(record.kind(), RecordKind::ContextUpdate);
    }

    #[test]
    fn context_without_markers_is_not_context_update() {
        let record = classify(json!({"context": {"overrides": {}}}));
        assert_eq!(record.kind(), RecordKind::Unknown);
    }

    #[test]
    fn source_list_is_context_update() {
        let record = classify(json!({"sources": [{"fileName": "a.pdf"}]}));
        assert_eq!(record.kind(), RecordKind::ContextUpdate);
    }

    #[test]
    fn plain_deltas() {
        assert_eq!(
            classify(json!({"delta": " world"})),
            Record::PlainDelta {
                text: " world".into()
            }
        );
        assert_eq!(
            classify(json!({"content": "Hello"})),
            Record::PlainDelta {
                text: "Hello".into()
            }
        );
        assert_eq!(
            classify(json!({"choices": [{"delta": {"content": "Hi", "role": "assistant"}}]})),
            Record::PlainDelta { text: "Hi".into() }
        );
    }

    #[test]
    fn unmapped_type_falls_back_to_shape() {
        let record = classify(json!({
            "type": "content_block_delta",
            "delta": {"type": "text_delta", "text": "Hi"}
        }));
        assert_eq!(record, Record::PlainDelta { text: "Hi".into() });
    }

    #[test]
    fn content_with_structure_is_not_a_delta() {
        let record = classify(json!({"content": "x", "citations": []}));
        assert_eq!(record.kind(), RecordKind::Unknown);
        assert!(record.payload().is_some());
    }

    #[test]
    fn unknown_keeps_payload() {
        let value = json!({"type": "ping"});
        let record = classify(value.clone());
        assert_eq!(record, Record::Unknown { payload: value });
    }
}
