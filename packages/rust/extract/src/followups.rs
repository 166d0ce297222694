//! Follow-up question suggestions.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::chain::{Alias, AliasChain, read_string_list};

/// `<<question>>` spans some backends append to the answer text.
static INLINE_FOLLOWUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<<([^<>]+)>>").expect("valid regex"));

const FOLLOWUP_ALIASES: &[Alias<Vec<String>>] = &[
    Alias::new("followup_questions", read_string_list),
    Alias::new("followupQuestions", read_string_list),
    Alias::new("follow_up_questions", read_string_list),
    Alias::new("context.followup_questions", read_string_list),
    Alias::new("answer.followup_questions", read_string_list),
    Alias::new("suggestions", read_string_list),
];

/// Follow-up chain.
pub const FOLLOWUPS: AliasChain<Vec<String>> = AliasChain::new("followup_questions", FOLLOWUP_ALIASES);

/// Follow-up questions, payload order. Empty when nothing matches.
pub fn extract_followups(payload: &Value) -> Vec<String> {
    FOLLOWUPS.extract(payload).unwrap_or_default()
}

/// Pull `<<question>>` spans out of `content`.
///
/// Returns the content with the spans removed (trailing whitespace
/// trimmed) and the questions in order of appearance.
pub fn extract_inline(content: &str) -> (String, Vec<String>) {
    let questions: Vec<String> = INLINE_FOLLOWUP_RE
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|q| !q.is_empty())
        .collect();

    if questions.is_empty() {
        return (content.to_string(), questions);
    }

    let stripped = INLINE_FOLLOWUP_RE.replace_all(content, "");
    (stripped.trim_end().to_string(), questions)
}
